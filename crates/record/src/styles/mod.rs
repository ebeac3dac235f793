//! Built-in record styles.

mod faq;
mod request;
#[cfg(feature = "mock")]
mod widget;

pub use self::faq::{Faq, FaqStyle};
pub use self::request::{Request, RequestStyle, System};
#[cfg(feature = "mock")]
pub use self::widget::{Part, Widget, WidgetStyle};
use crate::error::{ErrorKind, Result};
use crate::model::Model;
use serde_json::{Map, Value};

/// The object under a model's root, after re-rooting at `root`.
pub(crate) fn root_object(model: Model, root: &str) -> Result<(Model, Map<String, Value>)> {
    let model = model.rooted(root)?;
    match model.content() {
        Some(Value::Object(content)) => {
            let content = content.clone();
            Ok((model, content))
        },
        // An element with no children parses as `null`.
        Some(Value::Null) => Ok((model, Map::new())),
        _ => exn::bail!(ErrorKind::InvalidModel(root.to_string(), format!("`{root}` is not an element"))),
    }
}
