/// Views
///
/// Pure functions from state to widgets. Every interaction is turned into
/// a `crate::Message` and handled in `main.rs`.

pub mod images;
pub mod listing;
pub mod wizard;

use iced::widget::{column, text, text_input, TextInput};
use iced::{Element, Theme};

use crate::Message;

/// Text input whose border turns red when the field failed validation
pub fn checked_input<'a>(
    placeholder: &str,
    value: &str,
    invalid: bool,
) -> TextInput<'a, Message> {
    text_input(placeholder, value)
        .padding(8)
        .style(move |theme: &Theme, status| {
            let mut style = text_input::default(theme, status);
            if invalid {
                style.border.color = theme.palette().danger;
                style.border.width = 2.0;
            }
            style
        })
}

/// Small caption above an input
pub fn labeled<'a>(label: &'a str, input: impl Into<Element<'a, Message>>) -> Element<'a, Message> {
    column![text(label).size(14), input.into()].spacing(4).into()
}
