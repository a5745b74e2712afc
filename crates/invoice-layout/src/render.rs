//! One complete render: resolve sources, fetch, lay out, serialize

use crate::config::{AssetSource, FontSource, LayoutConfig, OutputConfig};
use crate::error::LayoutError;
use crate::host::Host;
use crate::layout::{paginate, RenderWarning};
use crate::pdf::{Font, StandardFont, TemplateDocument};
use crate::record::Record;
use tracing::{debug, info};

/// The finished PDF and what happened while producing it
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub warnings: Vec<RenderWarning>,
}

/// Where an asset's bytes will be fetched from, once attachments are looked up
enum Location {
    File(String),
    Url(String),
}

/// The render font, with any embedded font's location already resolved
enum FontPlan {
    Standard(StandardFont),
    Embedded(Location),
}

/// Render `record` onto the configured template.
///
/// Template and font sources are resolved before any bytes are fetched, so a
/// missing attachment fails with `ConfigurationMissing` without other I/O.
/// Nothing is returned unless the whole document rendered.
pub async fn render_invoice(
    host: &dyn Host,
    config: &LayoutConfig,
    record: &Record,
) -> Result<RenderedDocument, LayoutError> {
    config.validate()?;

    let template = resolve(host, &config.template, "template").await?;
    let font_plan = match &config.font {
        FontSource::Standard { standard } => FontPlan::Standard(*standard),
        FontSource::Embedded(source) => FontPlan::Embedded(resolve(host, source, "font").await?),
    };

    let template_bytes = fetch(host, &template).await?;
    let font = match font_plan {
        FontPlan::Standard(standard) => Font::standard(standard),
        FontPlan::Embedded(location) => Font::from_true_type(fetch(host, &location).await?)?,
    };
    debug!(template_len = template_bytes.len(), "fetched template");

    let mut doc = TemplateDocument::load(&template_bytes)?;
    let outcome = paginate(&mut doc, &font, config, record, host).await?;
    let bytes = doc.save(&font)?;
    let file_name = output_file_name(&config.output, record);

    info!(
        file_name = %file_name,
        pages = outcome.page_count,
        bytes = bytes.len(),
        warnings = outcome.warnings.len(),
        "rendered invoice"
    );

    Ok(RenderedDocument {
        file_name,
        bytes,
        page_count: outcome.page_count,
        warnings: outcome.warnings,
    })
}

async fn resolve(
    host: &dyn Host,
    source: &AssetSource,
    what: &str,
) -> Result<Location, LayoutError> {
    let location = match source {
        AssetSource::Attachment {
            app_id,
            record_id,
            field_key,
        } => {
            let file_key = host
                .fetch_record_field(*app_id, *record_id, field_key)
                .await?
                .ok_or_else(|| {
                    LayoutError::ConfigurationMissing(format!(
                        "{} attachment {} on record {}/{} has no file",
                        what, field_key, app_id, record_id
                    ))
                })?;
            Location::File(file_key)
        }
        AssetSource::FileKey { file_key } => Location::File(file_key.clone()),
        AssetSource::Url { url } => Location::Url(url.clone()),
    };

    match &location {
        Location::File(key) | Location::Url(key) if key.trim().is_empty() => Err(
            LayoutError::ConfigurationMissing(format!("{} source is empty", what)),
        ),
        _ => Ok(location),
    }
}

async fn fetch(host: &dyn Host, location: &Location) -> Result<Vec<u8>, LayoutError> {
    match location {
        Location::File(file_key) => host.fetch_file_bytes(file_key).await,
        Location::Url(url) => host.fetch_remote_bytes(url).await,
    }
}

/// `{prefix}{invoice number}.pdf`, with path separators replaced
pub fn output_file_name(output: &OutputConfig, record: &Record) -> String {
    let number: String = record
        .text(&output.invoice_number_field)
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{}{}.pdf", output.file_name_prefix, number)
}
