//! `hsync loggers`: configured loggers and the health of their history files.

use anyhow::Result;

use crate::config::{Browser, Config};

/// Health of one configured logger.
#[derive(Debug, Clone)]
pub struct LoggerHealth {
    pub name: String,
    pub browser: Browser,
    pub status: &'static str,
    pub healthy: bool,
}

pub fn get_loggers(config: &Config) -> Result<Vec<LoggerHealth>> {
    let mut out = Vec::new();
    for name in config.loggers.keys() {
        let settings = config.logger(name)?;
        let (status, healthy) = if settings.history_file.is_file() {
            ("OK", true)
        } else {
            ("MISSING (history file not found)", false)
        };
        out.push(LoggerHealth {
            name: name.clone(),
            browser: settings.browser,
            status,
            healthy,
        });
    }
    Ok(out)
}

pub fn list_loggers(config: &Config) -> Result<()> {
    let loggers = get_loggers(config)?;
    if loggers.is_empty() {
        println!("No loggers configured. Add a [loggers.<name>] table to the config.");
        return Ok(());
    }

    println!("{:<16} {:<10} {:<36} HEALTHY", "LOGGER", "BROWSER", "STATUS");
    for l in &loggers {
        println!(
            "{:<16} {:<10} {:<36} {}",
            l.name,
            format!("{:?}", l.browser).to_lowercase(),
            l.status,
            l.healthy
        );
    }

    Ok(())
}
