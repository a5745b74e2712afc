use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    /// The template or font attachment could not be resolved to a file.
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A text element's bounding box does not fit on the page.
    #[error(
        "{field} is outside the page bounds (x={x}, y={y}, width={width}, height={height}, page={page_width}x{page_height})"
    )]
    OutOfBounds {
        field: String,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        page_width: f32,
        page_height: f32,
    },

    #[error("Failed to embed image {field}: {reason}")]
    ImageEmbed { field: String, reason: String },

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for LayoutError {
    fn from(e: lopdf::Error) -> Self {
        LayoutError::Operation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_message_names_field() {
        let err = LayoutError::OutOfBounds {
            field: "amount".into(),
            x: 500.0,
            y: 10.0,
            width: 100.0,
            height: 11.1,
            page_width: 595.0,
            page_height: 842.0,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("amount is outside the page bounds"));
        assert!(msg.contains("page=595x842"));
    }

    #[test]
    fn test_lopdf_errors_become_operation_errors() {
        let err: LayoutError = lopdf::Error::ObjectNotFound.into();
        assert!(matches!(err, LayoutError::Operation(_)));
    }
}
