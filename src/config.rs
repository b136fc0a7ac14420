//! Demo configuration, read from `XSCOPE_*` environment variables.

use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid geometry `{0}`, expected WIDTHxHEIGHT[+X+Y]")]
    Geometry(String),
    #[error("Window size must not be zero")]
    EmptyWindow,
    #[error("Invalid number `{1}` for {0}")]
    Number(&'static str, String),
    #[error("{0} contains a NUL byte")]
    NulByte(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            x: 150,
            y: 50,
            width: 400,
            height: 300,
        }
    }
}

impl FromStr for Geometry {
    type Err = ConfigError;

    /// Parses the X11 style `WIDTHxHEIGHT[+X+Y]`, offsets may be negative.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Geometry(s.to_owned());

        let offset_start = s.find(|c: char| c == '+' || c == '-').unwrap_or(s.len());
        let (size, offsets) = s.split_at(offset_start);
        let (width, height) = size.split_once(&['x', 'X'][..]).ok_or_else(invalid)?;
        let width: u16 = width.parse().map_err(|_| invalid())?;
        let height: u16 = height.parse().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyWindow);
        }

        let (x, y) = if offsets.is_empty() {
            let def = Geometry::default();
            (def.x, def.y)
        } else {
            let second = offsets[1..]
                .find(|c: char| c == '+' || c == '-')
                .map(|i| i + 1)
                .ok_or_else(invalid)?;
            let (x, y) = offsets.split_at(second);
            (parse_offset(x).ok_or_else(invalid)?, parse_offset(y).ok_or_else(invalid)?)
        };

        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }
}

fn parse_offset(s: &str) -> Option<i16> {
    let digits = s.strip_prefix('+').unwrap_or(s);
    if digits.starts_with('+') {
        None
    } else {
        digits.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    /// `None` lets the connection fall back to `$DISPLAY`.
    pub display: Option<String>,
    pub geometry: Geometry,
    pub border_width: u16,
    pub title: String,
    /// Passed to `XSetLocaleModifiers`; empty means "read `XMODIFIERS`".
    pub locale_modifiers: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            display: None,
            geometry: Geometry::default(),
            border_width: 5,
            title: "xscope".into(),
            locale_modifiers: String::new(),
        }
    }
}

impl WindowConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(display) = lookup("XSCOPE_DISPLAY").filter(|d| !d.is_empty()) {
            config.display = Some(display);
        }

        if let Some(geometry) = lookup("XSCOPE_GEOMETRY") {
            config.geometry = geometry.trim().parse()?;
        }

        if let Some(border) = lookup("XSCOPE_BORDER") {
            config.border_width = border
                .trim()
                .parse()
                .map_err(|_| ConfigError::Number("XSCOPE_BORDER", border.clone()))?;
        }

        if let Some(title) = lookup("XSCOPE_TITLE") {
            config.title = title;
        }

        if let Some(modifiers) = lookup("XSCOPE_LOCALE_MODIFIERS") {
            config.locale_modifiers = modifiers;
        }

        log::debug!("config: {:?}", config);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = WindowConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, WindowConfig::default());
        assert_eq!(
            config.geometry,
            Geometry {
                x: 150,
                y: 50,
                width: 400,
                height: 300
            }
        );
        assert_eq!(config.border_width, 5);
    }

    #[test]
    fn geometry_size_only() {
        let g: Geometry = "800x600".parse().unwrap();
        assert_eq!((g.width, g.height, g.x, g.y), (800, 600, 150, 50));
    }

    #[test]
    fn geometry_with_offsets() {
        let g: Geometry = "640x480+10-20".parse().unwrap();
        assert_eq!((g.width, g.height, g.x, g.y), (640, 480, 10, -20));

        let g: Geometry = "1X1-5+0".parse().unwrap();
        assert_eq!((g.width, g.height, g.x, g.y), (1, 1, -5, 0));
    }

    #[test]
    fn geometry_rejects_garbage() {
        for bad in &["", "800", "x600", "800x", "axb", "800x600+10", "800x600++1+2", "800x600+1+2+3"] {
            assert!(bad.parse::<Geometry>().is_err(), "{} should not parse", bad);
        }
        assert_eq!("0x10".parse::<Geometry>(), Err(ConfigError::EmptyWindow));
    }

    #[test]
    fn overrides() {
        let config = WindowConfig::from_vars(vars(&[
            ("XSCOPE_DISPLAY", ":1"),
            ("XSCOPE_GEOMETRY", " 200x100+0+0 "),
            ("XSCOPE_BORDER", "0"),
            ("XSCOPE_TITLE", "dead keys"),
            ("XSCOPE_LOCALE_MODIFIERS", "@im=ibus"),
        ]))
        .unwrap();

        assert_eq!(config.display.as_deref(), Some(":1"));
        assert_eq!(config.geometry.width, 200);
        assert_eq!(config.geometry.x, 0);
        assert_eq!(config.border_width, 0);
        assert_eq!(config.title, "dead keys");
        assert_eq!(config.locale_modifiers, "@im=ibus");
    }

    #[test]
    fn empty_display_uses_default() {
        let config = WindowConfig::from_vars(vars(&[("XSCOPE_DISPLAY", "")])).unwrap();
        assert_eq!(config.display, None);
    }

    #[test]
    fn bad_border() {
        let err = WindowConfig::from_vars(vars(&[("XSCOPE_BORDER", "-1")])).unwrap_err();
        assert_eq!(err, ConfigError::Number("XSCOPE_BORDER", "-1".into()));
    }
}
