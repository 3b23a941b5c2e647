/// Storage keys and image ordering for uploads

use crate::state::images::StagedFile;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 11;

fn random_suffix() -> String {
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[fastrand::usize(..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// `{millis}-{suffix}.{ext}`, or without `.{ext}` when the file has no extension
pub fn storage_key(extension: Option<&str>, millis: i64, suffix: &str) -> String {
    match extension {
        Some(ext) if !ext.is_empty() => format!("{millis}-{suffix}.{ext}"),
        _ => format!("{millis}-{suffix}"),
    }
}

/// Key for a poster in the poster bucket
pub fn poster_key(file: &StagedFile) -> String {
    storage_key(
        file.extension(),
        chrono::Utc::now().timestamp_millis(),
        &random_suffix(),
    )
}

/// Key for a project image, scoped under the project's id
pub fn project_image_key(project_id: &str, file: &StagedFile) -> String {
    format!(
        "{}/{}",
        project_id,
        storage_key(
            file.extension(),
            chrono::Utc::now().timestamp_millis(),
            &random_suffix()
        )
    )
}

/// Display order of the image at `index` when `primary` is the cover
///
/// The cover moves to 0, images before it shift up by one, and images
/// after it keep their position.
pub fn display_order(index: usize, primary: usize) -> usize {
    if index == primary {
        0
    } else if index < primary {
        index + 1
    } else {
        index
    }
}

/// Orders for `count` images; an out-of-range cover is treated as 0
pub fn display_orders(count: usize, primary: usize) -> Vec<usize> {
    let primary = if primary < count { primary } else { 0 };
    (0..count).map(|i| display_order(i, primary)).collect()
}
