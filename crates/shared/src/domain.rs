use std::{fmt, ops::RangeInclusive, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filter '{0}'; available filters: invert, grayscale, contrast, blur, sharpen")]
pub struct UnknownFilter(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported output format '{0}'; expected JPEG or PNG")]
pub struct UnknownOutputFormat(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterId {
    Invert,
    Grayscale,
    Contrast,
    Blur,
    Sharpen,
}

impl FilterId {
    /// Catalog order. Also the order of the 1-5 quick-select shortcuts.
    pub const ALL: [FilterId; 5] = [
        FilterId::Invert,
        FilterId::Grayscale,
        FilterId::Contrast,
        FilterId::Blur,
        FilterId::Sharpen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterId::Invert => "invert",
            FilterId::Grayscale => "grayscale",
            FilterId::Contrast => "contrast",
            FilterId::Blur => "blur",
            FilterId::Sharpen => "sharpen",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterId::Invert => "Invert",
            FilterId::Grayscale => "Grayscale",
            FilterId::Contrast => "Contrast",
            FilterId::Blur => "Blur",
            FilterId::Sharpen => "Sharpen",
        }
    }

    /// Maps `'1'..='5'` onto the catalog order.
    pub fn from_shortcut(key: char) -> Option<Self> {
        let index = key.to_digit(10)?.checked_sub(1)? as usize;
        Self::ALL.get(index).copied()
    }

    pub fn spec(self) -> &'static FilterSpec {
        FilterCatalog::get(self)
    }

    /// The single numeric parameter this filter accepts, if any.
    pub fn parameter(self) -> Option<FilterParameter> {
        self.spec().parameters.first().copied()
    }

    pub fn has_parameters(self) -> bool {
        self.spec().has_parameters()
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterId {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| UnknownFilter(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterParameter {
    ContrastFactor,
    BlurRadius,
    SharpenFactor,
}

impl FilterParameter {
    pub const ALL: [FilterParameter; 3] = [
        FilterParameter::ContrastFactor,
        FilterParameter::BlurRadius,
        FilterParameter::SharpenFactor,
    ];

    /// Stable identifier of the slider control bound to this parameter.
    pub fn control_id(self) -> &'static str {
        match self {
            FilterParameter::ContrastFactor => "contrast-factor",
            FilterParameter::BlurRadius => "blur-radius",
            FilterParameter::SharpenFactor => "sharpen-factor",
        }
    }

    /// Multipart field name expected by `POST /process`.
    pub fn form_field(self) -> &'static str {
        match self {
            FilterParameter::ContrastFactor | FilterParameter::SharpenFactor => "factor",
            FilterParameter::BlurRadius => "radius",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterParameter::ContrastFactor => "Contrast factor",
            FilterParameter::BlurRadius => "Blur radius",
            FilterParameter::SharpenFactor => "Sharpen factor",
        }
    }

    pub fn default_value(self) -> f64 {
        match self {
            FilterParameter::ContrastFactor => 1.5,
            FilterParameter::BlurRadius => 2.0,
            FilterParameter::SharpenFactor => 2.0,
        }
    }

    pub fn range(self) -> RangeInclusive<f64> {
        match self {
            FilterParameter::ContrastFactor => 0.0..=3.0,
            FilterParameter::BlurRadius => 0.0..=10.0,
            FilterParameter::SharpenFactor => 0.0..=5.0,
        }
    }

    pub fn step(self) -> f64 {
        0.1
    }
}

impl fmt::Display for FilterParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.control_id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSpec {
    pub id: FilterId,
    pub parameters: &'static [FilterParameter],
}

impl FilterSpec {
    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    pub fn declares(&self, parameter: FilterParameter) -> bool {
        self.parameters.contains(&parameter)
    }
}

pub struct FilterCatalog;

static CATALOG: [FilterSpec; 5] = [
    FilterSpec {
        id: FilterId::Invert,
        parameters: &[],
    },
    FilterSpec {
        id: FilterId::Grayscale,
        parameters: &[],
    },
    FilterSpec {
        id: FilterId::Contrast,
        parameters: &[FilterParameter::ContrastFactor],
    },
    FilterSpec {
        id: FilterId::Blur,
        parameters: &[FilterParameter::BlurRadius],
    },
    FilterSpec {
        id: FilterId::Sharpen,
        parameters: &[FilterParameter::SharpenFactor],
    },
];

impl FilterCatalog {
    pub fn entries() -> &'static [FilterSpec] {
        &CATALOG
    }

    pub fn get(id: FilterId) -> &'static FilterSpec {
        match id {
            FilterId::Invert => &CATALOG[0],
            FilterId::Grayscale => &CATALOG[1],
            FilterId::Contrast => &CATALOG[2],
            FilterId::Blur => &CATALOG[3],
            FilterId::Sharpen => &CATALOG[4],
        }
    }
}

/// Encodings the service converts to on retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Jpeg, OutputFormat::Png];

    /// Value of the `format` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

impl FromStr for OutputFormat {
    type Err = UnknownOutputFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JPEG" | "JPG" => Ok(OutputFormat::Jpeg),
            "PNG" => Ok(OutputFormat::Png),
            _ => Err(UnknownOutputFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcut_digits_follow_catalog_order() {
        assert_eq!(FilterId::from_shortcut('1'), Some(FilterId::Invert));
        assert_eq!(FilterId::from_shortcut('3'), Some(FilterId::Contrast));
        assert_eq!(FilterId::from_shortcut('5'), Some(FilterId::Sharpen));
        assert_eq!(FilterId::from_shortcut('0'), None);
        assert_eq!(FilterId::from_shortcut('6'), None);
        assert_eq!(FilterId::from_shortcut('x'), None);
    }

    #[test]
    fn only_three_filters_are_parameterized() {
        let parameterized: Vec<_> = FilterCatalog::entries()
            .iter()
            .filter(|spec| spec.has_parameters())
            .map(|spec| spec.id)
            .collect();
        assert_eq!(
            parameterized,
            vec![FilterId::Contrast, FilterId::Blur, FilterId::Sharpen]
        );
        for spec in FilterCatalog::entries() {
            assert!(spec.parameters.len() <= 1, "{} has >1 parameter", spec.id);
            assert_eq!(FilterCatalog::get(spec.id).id, spec.id);
        }
    }

    #[test]
    fn form_fields_match_service_contract() {
        assert_eq!(FilterId::Contrast.parameter().map(|p| p.form_field()), Some("factor"));
        assert_eq!(FilterId::Blur.parameter().map(|p| p.form_field()), Some("radius"));
        assert_eq!(FilterId::Sharpen.parameter().map(|p| p.form_field()), Some("factor"));
        assert_eq!(FilterId::Invert.parameter(), None);
    }

    #[test]
    fn parses_filter_and_format_case_insensitively() {
        assert_eq!(" Blur ".parse::<FilterId>(), Ok(FilterId::Blur));
        assert!("sepia".parse::<FilterId>().is_err());
        assert_eq!("png".parse::<OutputFormat>(), Ok(OutputFormat::Png));
        assert_eq!("jpg".parse::<OutputFormat>(), Ok(OutputFormat::Jpeg));
        assert!("gif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn defaults_sit_inside_ranges() {
        for parameter in FilterParameter::ALL {
            assert!(parameter.range().contains(&parameter.default_value()));
        }
    }
}
