//! Code for generating the storage paths of task attachments.

use uuid::Uuid;

/// The directory component of generated attachment paths.
pub const TASK_UPLOAD_DIR: &str = "tasks";

/// Generate the storage path for a task attachment.
///
/// The original file name is replaced with a random UUID so the stored path
/// reveals nothing about the uploaded file. Only the extension is kept, which
/// is whatever follows the last `.` in `original_filename`, or the whole name
/// if there is no `.`.
pub fn task_upload_path(original_filename: &str) -> String {
    let extension = match original_filename.rsplit_once('.') {
        Some((_, extension)) => extension,
        None => original_filename,
    };

    format!("{TASK_UPLOAD_DIR}/{}.{extension}", Uuid::new_v4())
}
