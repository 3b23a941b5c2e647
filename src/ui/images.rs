/// Staged image grid for the wizard's first step
use iced::widget::{button, column, container, image, row, text};
use iced::{Alignment, Element, Length, Theme};
use iced_aw::Wrap;

use crate::state::images::ImageManager;
use crate::Message;

const THUMB_WIDTH: f32 = 140.0;
const THUMB_HEIGHT: f32 = 100.0;

pub fn grid(images: &ImageManager, invalid: bool) -> Element<'_, Message> {
    let count = images.len();
    let primary = images.primary_index();

    let header = row![
        text(format!("Images ({}/{})", count, images.max_images())).size(14),
        button("Add images")
            .on_press_maybe((images.remaining() > 0).then_some(Message::PickImages))
            .padding([4, 10]),
    ]
    .spacing(12)
    .align_y(Alignment::Center);

    if count == 0 {
        let hint = text("Add at least one image. The starred image becomes the cover.").size(13);
        let hint = if invalid { hint.style(text::danger) } else { hint };
        return column![header, hint].spacing(8).into();
    }

    let tiles: Vec<Element<Message>> = images
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let is_primary = i == primary;
            let controls = row![
                button(if is_primary { "★" } else { "☆" })
                    .on_press(Message::SetPrimary(i))
                    .style(button::text),
                button("◀")
                    .on_press_maybe((i > 0).then(|| Message::MoveImage(i, i - 1)))
                    .style(button::text),
                button("▶")
                    .on_press_maybe((i + 1 < count).then(|| Message::MoveImage(i, i + 1)))
                    .style(button::text),
                button("✕")
                    .on_press(Message::RemoveImage(i))
                    .style(button::text),
            ]
            .spacing(2);

            let tile = column![
                image(entry.preview.image().clone())
                    .width(Length::Fixed(THUMB_WIDTH))
                    .height(Length::Fixed(THUMB_HEIGHT)),
                text(&entry.file.name).size(11),
                controls,
            ]
            .spacing(4)
            .align_x(Alignment::Center);

            container(tile)
                .padding(6)
                .style(move |theme: &Theme| {
                    let mut style = container::bordered_box(theme);
                    if is_primary {
                        style.border.color = theme.palette().primary;
                        style.border.width = 2.0;
                    }
                    style
                })
                .into()
        })
        .collect();

    column![
        header,
        Wrap::with_elements(tiles).spacing(10.0).line_spacing(10.0),
    ]
    .spacing(8)
    .into()
}
