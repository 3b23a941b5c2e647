/// State management module
///
/// This module holds all client-side state, including:
/// - Rows exchanged with the record store (data.rs)
/// - Staged images and their preview handles (images.rs)
/// - The wizard's form record (form.rs) and its step checks (validate.rs)
/// - Course search box state (course_picker.rs)
/// - The wizard state machine (wizard.rs)
/// - The approved-project listing (listing.rs)

pub mod course_picker;
pub mod data;
pub mod form;
pub mod images;
pub mod listing;
pub mod validate;
pub mod wizard;
