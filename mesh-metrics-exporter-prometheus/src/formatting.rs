//! Helpers for rendering metrics in the Prometheus exposition format.

use mesh_metrics::{Identity, LabelSet};

/// A sample value as written into the exposition output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleValue {
    /// A signed integer value.
    Integer(i64),
    /// An unsigned integer value.
    Unsigned(u64),
    /// A floating-point value.
    Float(f64),
}

/// Derives the metric name stem for a registry.
///
/// The stem is every label key, in sorted order, followed by the type name, all joined by
/// underscores.  A registry without labels uses its type name alone.
pub fn metric_stem(identity: &Identity) -> String {
    let mut stem = String::new();
    for key in identity.labels().keys() {
        stem.push_str(key);
        stem.push('_');
    }
    stem.push_str(identity.type_name());
    sanitize_metric_name(&stem)
}

/// Renders a label set into its `{key="value",...}` form.
///
/// Returns an empty string for an empty label set.
pub fn render_labels(labels: &LabelSet) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let mut rendered = String::from("{");
    let mut first = true;
    for label in labels {
        if first {
            first = false;
        } else {
            rendered.push(',');
        }
        rendered.push_str(&sanitize_label_key(label.key()));
        rendered.push_str("=\"");
        rendered.push_str(&sanitize_label_value(label.value()));
        rendered.push('"');
    }
    rendered.push('}');
    rendered
}

/// Writes a metric in the Prometheus [exposition format].
///
/// `name` must already be sanitized, and `labels` must already be rendered via [`render_labels`].
/// When `suffix` is specified, it is appended to `name` with an underscore, which is how the
/// derived series of a histogram are written.
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn write_metric_line(
    buffer: &mut String,
    name: &str,
    suffix: Option<&'static str>,
    labels: &str,
    value: SampleValue,
) {
    buffer.push_str(name);
    if let Some(suffix) = suffix {
        buffer.push('_');
        buffer.push_str(suffix);
    }
    buffer.push_str(labels);
    buffer.push(' ');
    write_value(buffer, value);
    buffer.push('\n');
}

/// Writes a sample value, always with at least one decimal digit.
pub fn write_value(buffer: &mut String, value: SampleValue) {
    match value {
        SampleValue::Integer(v) => {
            buffer.push_str(itoa::Buffer::new().format(v));
            buffer.push_str(".0");
        }
        SampleValue::Unsigned(v) => {
            buffer.push_str(itoa::Buffer::new().format(v));
            buffer.push_str(".0");
        }
        SampleValue::Float(v) => write_float(buffer, v),
    }
}

fn write_float(buffer: &mut String, value: f64) {
    if value.is_nan() {
        buffer.push_str("NaN");
    } else if value.is_infinite() {
        buffer.push_str(if value.is_sign_positive() { "+Inf" } else { "-Inf" });
    } else {
        // `Display` for floats never uses exponents, and leaves integral values bare.
        buffer.push_str(value.to_string().as_str());
        if value.fract() == 0.0 {
            buffer.push_str(".0");
        }
    }
}

/// Sanitizes a metric name to be valid under the Prometheus [data model].
///
/// [data model]: https://prometheus.io/docs/concepts/data_model/#metric-names-and-labels
pub fn sanitize_metric_name(name: &str) -> String {
    // The first character must be [a-zA-Z_:], and all subsequent characters must be [a-zA-Z0-9_:].
    name.chars()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 && valid_metric_name_start_character(c)
                || i != 0 && valid_metric_name_character(c)
            {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sanitizes a label key to be valid under the Prometheus [data model].
///
/// [data model]: https://prometheus.io/docs/concepts/data_model/#metric-names-and-labels
pub fn sanitize_label_key(key: &str) -> String {
    // The first character must be [a-zA-Z_], and all subsequent characters must be [a-zA-Z0-9_].
    key.chars()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 && valid_label_key_start_character(c)
                || i != 0 && valid_label_key_character(c)
            {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sanitizes a label value to be valid under the Prometheus [data model].
///
/// [data model]: https://prometheus.io/docs/concepts/data_model/#metric-names-and-labels
pub fn sanitize_label_value(value: &str) -> String {
    // All Unicode characters are valid, but backslashes, double quotes, and line feeds must be
    // escaped.
    let mut sanitized = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => sanitized.push_str("\\\\"),
            '"' => sanitized.push_str("\\\""),
            '\n' => sanitized.push_str("\\n"),
            c => sanitized.push(c),
        }
    }
    sanitized
}

#[inline]
fn valid_metric_name_start_character(c: char) -> bool {
    // Essentially, needs to match the regex pattern of [a-zA-Z_:].
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

#[inline]
fn valid_metric_name_character(c: char) -> bool {
    // Essentially, needs to match the regex pattern of [a-zA-Z0-9_:].
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

#[inline]
fn valid_label_key_start_character(c: char) -> bool {
    // Essentially, needs to match the regex pattern of [a-zA-Z_].
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn valid_label_key_character(c: char) -> bool {
    // Essentially, needs to match the regex pattern of [a-zA-Z0-9_].
    c.is_ascii_alphanumeric() || c == '_'
}
