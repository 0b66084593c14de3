use crate::data::{SharedDatabase, lock_database};
use crate::error::{Result, SitemapError};
use crate::model::DiscoveredUrl;
use chrono::{DateTime, SecondsFormat, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Clone)]
pub struct GeneratedSitemap {
    pub domain: String,
    pub xml: String,
    pub gzipped: Vec<u8>,
    pub total_urls: usize,
    pub generated_at: DateTime<Utc>,
}

/// Render a `<urlset>` document for the given records, in order.
pub fn render_sitemap(urls: &[DiscoveredUrl]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NAMESPACE));
    writer.write_event(Event::Start(urlset))?;

    for url in urls {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        write_text_element(&mut writer, "loc", &url.url)?;
        write_text_element(
            &mut writer,
            "lastmod",
            &url.last_modified.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        write_text_element(&mut writer, "changefreq", url.change_frequency.as_str())?;
        write_text_element(&mut writer, "priority", &format!("{:.1}", url.priority))?;
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| SitemapError::Encoding(e.to_string()))
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Build the sitemap for a domain from its stored 200-status records.
pub fn generate_sitemap(db: &SharedDatabase, domain: &str) -> Result<GeneratedSitemap> {
    let urls = {
        let conn = lock_database(db)?;
        conn.sitemap_urls(domain)?
    };

    let xml = render_sitemap(&urls)?;
    let gzipped = gzip(xml.as_bytes())?;

    info!(
        "Generated sitemap for {} with {} URLs ({} bytes gzipped)",
        domain,
        urls.len(),
        gzipped.len()
    );

    Ok(GeneratedSitemap {
        domain: domain.to_string(),
        xml,
        gzipped,
        total_urls: urls.len(),
        generated_at: Utc::now(),
    })
}

/// Write the sitemap to `path`, creating parent directories as needed.
pub fn write_sitemap_file(path: &Path, sitemap: &GeneratedSitemap, compress: bool) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    if compress {
        fs::write(path, &sitemap.gzipped)?;
    } else {
        fs::write(path, sitemap.xml.as_bytes())?;
    }

    info!("Sitemap for {} written to {}", sitemap.domain, path.display());
    Ok(())
}
