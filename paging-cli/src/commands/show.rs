//! Print the effective configuration.

use anyhow::Result;
use pagekit_client::PagingConfig;
use std::io::Write;

use crate::config;

/// Run the config command.
pub fn run<W: Write>(paging: &PagingConfig, out: &mut W) -> Result<()> {
    let rendered = config::render(paging)?;
    writeln!(out, "# effective paging configuration")?;
    write!(out, "{}", rendered)?;
    writeln!(out, "# prefetch distance: {} items", paging.prefetch_distance())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_defaults() {
        let mut out = Vec::new();
        run(&PagingConfig::default(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("page_size = 20"));
        assert!(text.contains("prefetch distance: 10 items"));
    }
}
