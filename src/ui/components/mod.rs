mod create_post_form;
mod input;
mod key_result;

pub use create_post_form::{CreatePostForm, FormEvent, Submission};
pub use key_result::KeyResult;
