/// Select query description shared by every record store backend
///
/// A query names a collection, an optional column projection, nested
/// relations to expand, equality filters, multi-key ordering and a limit.
/// The REST backend renders it into URL parameters; the local backend
/// evaluates it in-process.

use serde_json::Value;

/// A related collection expanded into each selected row
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub relation: String,
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
}

impl Embed {
    pub fn new(relation: &str, columns: &[&str]) -> Self {
        Self {
            relation: relation.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            embeds: Vec::new(),
        }
    }

    /// Nest a further relation inside this one
    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    fn render(&self) -> String {
        format!("{}({})", self.relation, render_select(&self.columns, &self.embeds))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    /// Projected columns; empty means every column
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
    /// Equality filters, all of which must hold
    pub filters: Vec<(String, Value)>,
    pub order: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            embeds: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The `select=` parameter value, e.g. `id,name,courses(name)`
    pub fn select_param(&self) -> String {
        render_select(&self.columns, &self.embeds)
    }

    /// The `order=` parameter value, e.g. `display_order.asc,created_at.desc`
    pub fn order_param(&self) -> Option<String> {
        if self.order.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .order
            .iter()
            .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
            .collect();
        Some(parts.join(","))
    }
}

fn render_select(columns: &[String], embeds: &[Embed]) -> String {
    let mut parts: Vec<String> = if columns.is_empty() {
        vec!["*".to_string()]
    } else {
        columns.to_vec()
    };
    parts.extend(embeds.iter().map(Embed::render));
    parts.join(",")
}

/// Render a filter value the way the REST API expects it after `eq.`
pub fn filter_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
