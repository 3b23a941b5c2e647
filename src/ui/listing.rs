/// Approved project listing with course filter chips
use std::collections::HashMap;

use iced::widget::{button, checkbox, column, container, image, row, scrollable, text, Space};
use iced::{Alignment, Element, Length};
use iced_aw::Wrap;

use crate::state::data::Project;
use crate::state::listing::Listing;
use crate::Message;

const CARD_WIDTH: f32 = 240.0;
const COVER_HEIGHT: f32 = 150.0;

pub fn view<'a>(
    listing: &'a Listing,
    covers: &'a HashMap<String, image::Handle>,
    status: &'a str,
) -> Element<'a, Message> {
    let header = row![
        text("Student projects").size(32),
        Space::with_width(Length::Fill),
        button("Refresh").on_press(Message::Refresh).padding(8),
        button("Submit a project")
            .on_press(Message::OpenWizard)
            .style(button::primary)
            .padding(8),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let chips: Vec<Element<Message>> = listing
        .courses
        .iter()
        .map(|course| {
            let id = course.id.clone();
            checkbox(&course.name, listing.is_selected(&course.id))
                .on_toggle(move |_| Message::ToggleCourseFilter(id.clone()))
                .into()
        })
        .collect();

    let filter_bar = row![
        Wrap::with_elements(chips).spacing(14.0).line_spacing(8.0),
        button("Clear")
            .on_press_maybe((!listing.selected().is_empty()).then_some(Message::ClearCourseFilter))
            .style(button::text),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let body: Element<Message> = if listing.loading {
        text("Loading projects...").into()
    } else if let Some(error) = &listing.error {
        text(error).style(text::danger).into()
    } else {
        let visible = listing.visible_projects();
        if visible.is_empty() {
            text("No projects match the selected courses.").into()
        } else {
            let cards = visible.into_iter().map(|p| card(p, covers)).collect();
            scrollable(Wrap::with_elements(cards).spacing(16.0).line_spacing(16.0))
                .height(Length::Fill)
                .into()
        }
    };

    column![header, filter_bar, body, text(status).size(13)]
        .spacing(16)
        .padding(24)
        .into()
}

fn card<'a>(project: &'a Project, covers: &'a HashMap<String, image::Handle>) -> Element<'a, Message> {
    let cover: Element<Message> = match project
        .cover_image()
        .and_then(|img| covers.get(&img.image_url))
    {
        Some(handle) => image(handle.clone())
            .width(Length::Fixed(CARD_WIDTH))
            .height(Length::Fixed(COVER_HEIGHT))
            .into(),
        None => container(text("No image").size(12))
            .width(Length::Fixed(CARD_WIDTH))
            .height(Length::Fixed(COVER_HEIGHT))
            .center_x(Length::Fixed(CARD_WIDTH))
            .center_y(Length::Fixed(COVER_HEIGHT))
            .into(),
    };

    let subtitle = match project.course_name() {
        Some(course) => format!("{} · {}", course, project.year),
        None => project.year.to_string(),
    };

    let mut content = column![
        cover,
        text(&project.title).size(18),
        text(subtitle).size(13).style(text::secondary),
    ]
    .spacing(6)
    .width(Length::Fixed(CARD_WIDTH));

    let tags = project.tags();
    if !tags.is_empty() {
        content = content.push(text(tags.join(" · ")).size(12));
    }
    if let Some(creators) = &project.student_creators {
        content = content.push(text(creators).size(12));
    }

    container(content)
        .padding(10)
        .style(container::bordered_box)
        .into()
}
