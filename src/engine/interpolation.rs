//! Message interpolation.

use crate::core::types::Value;
use crate::metadata::descriptor::ConstraintDescriptor;

/// Turns a message template into the final message of a violation.
pub trait MessageInterpolator: Send + Sync {
    /// Interpolate `template` for a failure of `descriptor` on `value`.
    fn interpolate(&self, template: &str, descriptor: &ConstraintDescriptor, value: &Value) -> String;
}

/// Replaces `{name}` with the value of attribute `name`.
///
/// Unknown placeholders are left as they are; `\{` and `\}` produce literal
/// braces.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeInterpolator;

impl MessageInterpolator for AttributeInterpolator {
    fn interpolate(&self, template: &str, descriptor: &ConstraintDescriptor, _value: &Value) -> String {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' if matches!(chars.peek(), Some('{') | Some('}')) => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == '}' {
                            closed = true;
                            break;
                        }
                        name.push(next);
                    }
                    match descriptor.attribute(&name) {
                        Some(value) if closed => out.push_str(&value.to_string()),
                        _ => {
                            out.push('{');
                            out.push_str(&name);
                            if closed {
                                out.push('}');
                            }
                        }
                    }
                }
                other => out.push(other),
            }
        }
        out
    }
}
