/// Three-step submission wizard
use iced::widget::{button, checkbox, column, container, row, scrollable, text, Column, Space};
use iced::{Alignment, Element, Length};
use iced_aw::Wrap;

use super::{checked_input, images, labeled};
use crate::state::course_picker::PickerKey;
use crate::state::form::{Field, FieldUpdate};
use crate::state::wizard::{Step, Wizard, WizardError};
use crate::Message;

pub fn view(wizard: &Wizard) -> Element<'_, Message> {
    let step = wizard.step();
    let heading = match step.number() {
        Some(n) => format!("Step {} of 3 · {}", n, step.title()),
        None => step.title().to_string(),
    };

    let header = row![
        text(heading).size(26),
        Space::with_width(Length::Fill),
        button("✕").on_press(Message::CloseWizard).style(button::text),
    ]
    .align_y(Alignment::Center);

    let mut page = Column::new().push(header).spacing(16).padding(24);

    if let Some(error) = wizard.error() {
        page = page.push(text(error.to_string()).style(text::danger));
        if let WizardError::Submit(e) = error {
            page = page.push(text(e.kind().hint()).size(13).style(text::secondary));
        }
    }
    if let Some(advisory) = wizard.advisory() {
        page = page.push(text(advisory).size(13).style(text::secondary));
    }

    let body = match step {
        Step::Details => details(wizard),
        Step::Contributor => contributor(wizard),
        Step::Confirm => confirm(wizard),
        Step::Submitting => text("Submitting your project...").into(),
        Step::Success => success(wizard),
    };

    page.push(scrollable(body).height(Length::Fill))
        .push(navigation(step))
        .into()
}

fn navigation<'a>(step: Step) -> Element<'a, Message> {
    let back = button("Back").on_press_maybe(
        matches!(step, Step::Contributor | Step::Confirm).then_some(Message::Back),
    );
    let forward = match step {
        Step::Details | Step::Contributor => button("Next")
            .on_press(Message::Next)
            .style(button::primary),
        Step::Confirm => button("Submit")
            .on_press(Message::Submit)
            .style(button::primary),
        Step::Submitting => button("Submit").style(button::primary),
        Step::Success => button("Close").on_press(Message::CloseWizard),
    };

    row![back, Space::with_width(Length::Fill), forward]
        .spacing(10)
        .into()
}

fn details(wizard: &Wizard) -> Element<'_, Message> {
    let form = wizard.form();
    let limits = wizard.limits();

    let title = checked_input("Project title", &form.title, wizard.is_invalid(Field::Title))
        .on_input(|v| Message::FieldChanged(FieldUpdate::Title(v)));
    let description = checked_input(
        "What is the project about?",
        &form.description,
        wizard.is_invalid(Field::Description),
    )
    .on_input(|v| Message::FieldChanged(FieldUpdate::Description(v)));
    let year = checked_input(
        &format!("{}-{}", limits.year_min, limits.year_max),
        &form.year,
        wizard.is_invalid(Field::Year),
    )
    .on_input(|v| Message::FieldChanged(FieldUpdate::Year(v)))
    .width(Length::Fixed(120.0));
    let video = checked_input("https://", &form.video_url, false)
        .on_input(|v| Message::FieldChanged(FieldUpdate::VideoUrl(v)));
    let creators = checked_input("Names, comma separated", &form.student_creators, false)
        .on_input(|v| Message::FieldChanged(FieldUpdate::StudentCreators(v)));

    column![
        labeled("Title", title),
        labeled("Description", description),
        row![labeled("Year", year), labeled("Course", course_picker(wizard))].spacing(16),
        labeled("Video URL (optional)", video),
        labeled("Creators (optional)", creators),
        filters(wizard),
        poster(wizard),
        images::grid(&form.images, wizard.is_invalid(Field::ImageFiles)),
    ]
    .spacing(14)
    .into()
}

fn course_picker(wizard: &Wizard) -> Element<'_, Message> {
    let picker = wizard.picker();
    let search = checked_input(
        "Search courses",
        &picker.search,
        wizard.is_invalid(Field::CourseId),
    )
    .on_input(Message::CourseSearch)
    .on_submit(Message::CourseKey(PickerKey::Enter));

    let mut picker_column = Column::new().spacing(2).width(Length::Fixed(320.0));
    let search_row = if wizard.form().course_id.is_empty() {
        row![search]
    } else {
        row![search, button("Clear").on_press(Message::ClearCourse).style(button::text)]
            .spacing(6)
            .align_y(Alignment::Center)
    };
    picker_column = picker_column.push(search_row);

    if picker.open {
        let matches = wizard.course_matches();
        if matches.is_empty() {
            picker_column = picker_column.push(text("No matching courses").size(12));
        }
        for (i, course) in matches.into_iter().enumerate() {
            let style: fn(&iced::Theme, button::Status) -> button::Style = if picker.highlighted == Some(i) {
                button::primary
            } else {
                button::text
            };
            picker_column = picker_column.push(
                button(text(&course.name).size(13))
                    .on_press(Message::CourseChosen(course.id.clone()))
                    .style(style)
                    .width(Length::Fill),
            );
        }
    }

    picker_column.into()
}

fn filters(wizard: &Wizard) -> Element<'_, Message> {
    let selected = &wizard.form().selected_filters;
    let mut groups = Column::new().spacing(10).push(text("Tags (optional)").size(14));

    for (kind, filters) in wizard.filters_by_type() {
        let boxes: Vec<Element<Message>> = filters
            .into_iter()
            .map(|filter| {
                let id = filter.id.clone();
                checkbox(&filter.value, selected.contains(&filter.id))
                    .on_toggle(move |_| Message::ToggleFilter(id.clone()))
                    .into()
            })
            .collect();
        groups = groups
            .push(text(kind).size(13).style(text::secondary))
            .push(Wrap::with_elements(boxes).spacing(12.0).line_spacing(6.0));
    }

    groups.into()
}

fn poster(wizard: &Wizard) -> Element<'_, Message> {
    let current: Element<Message> = match &wizard.form().poster {
        Some(file) => row![
            text(&file.name).size(13),
            button("Remove")
                .on_press(Message::FieldChanged(FieldUpdate::Poster(None)))
                .style(button::text),
        ]
        .spacing(8)
        .align_y(Alignment::Center)
        .into(),
        None => text("No poster").size(13).into(),
    };

    labeled(
        "Poster (optional, image or PDF)",
        row![button("Choose poster").on_press(Message::PickPoster), current]
            .spacing(10)
            .align_y(Alignment::Center),
    )
}

fn contributor(wizard: &Wizard) -> Element<'_, Message> {
    let form = wizard.form();

    let name = checked_input("Full name", &form.student_name, wizard.is_invalid(Field::StudentName))
        .on_input(|v| Message::FieldChanged(FieldUpdate::StudentName(v)));
    let email = checked_input(
        "name@example.com",
        &form.student_email,
        wizard.is_invalid(Field::StudentEmail),
    )
    .on_input(|v| Message::FieldChanged(FieldUpdate::StudentEmail(v)));
    let number = checked_input(
        "123456789 or AU123456",
        &form.student_number,
        wizard.is_invalid(Field::StudentNumber),
    )
    .on_input(|v| Message::FieldChanged(FieldUpdate::StudentNumber(v)));

    column![
        labeled("Name", name),
        labeled("Email", email),
        labeled("Student number", number),
    ]
    .spacing(14)
    .into()
}

fn confirm(wizard: &Wizard) -> Element<'_, Message> {
    let form = wizard.form();
    let course = wizard
        .courses()
        .iter()
        .find(|c| c.id == form.course_id)
        .map(|c| c.name.as_str())
        .unwrap_or("-");

    let summary = column![
        text(&form.title).size(20),
        text(format!("{} · {}", course, form.year.trim())).size(13),
        text(format!(
            "{} image(s), {} tag(s){}",
            form.images.len(),
            form.selected_filters.len(),
            if form.poster.is_some() { ", poster attached" } else { "" }
        ))
        .size(13),
        text(format!("Submitted by {} <{}>", form.student_name.trim(), form.student_email.trim())).size(13),
    ]
    .spacing(4);

    let passphrase = checked_input(
        "Passphrase from your instructor",
        &form.passphrase,
        wizard.is_invalid(Field::Passphrase),
    )
    .secure(true)
    .on_input(|v| Message::FieldChanged(FieldUpdate::Passphrase(v)))
    .on_submit(Message::Submit);

    let consent = checkbox(
        "I agree that this project may be shown publicly once approved",
        form.consent,
    )
    .on_toggle(|v| Message::FieldChanged(FieldUpdate::Consent(v)));
    let consent: Element<Message> = if wizard.is_invalid(Field::Consent) {
        container(consent)
            .padding(4)
            .style(|theme: &iced::Theme| {
                let mut style = container::bordered_box(theme);
                style.border.color = theme.palette().danger;
                style
            })
            .into()
    } else {
        consent.into()
    };

    column![
        container(summary).padding(10).style(container::bordered_box),
        labeled("Passphrase", passphrase),
        consent,
    ]
    .spacing(14)
    .into()
}

fn success(wizard: &Wizard) -> Element<'_, Message> {
    let mut content = column![
        text("Thank you! Your project was submitted.").size(20),
        text("It will appear in the listing once it has been approved.").size(14),
    ]
    .spacing(8);

    if let Some(receipt) = wizard.receipt() {
        content = content.push(
            text(format!("Reference: {}", receipt.project_id))
                .size(12)
                .style(text::secondary),
        );
    }

    content.into()
}
