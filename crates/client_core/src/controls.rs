use std::ops::RangeInclusive;

use shared::domain::FilterParameter;

/// A numeric input bound to one filter parameter.
pub trait ParameterControl: Send {
    fn value(&self) -> f64;
    /// Stores `value` clamped to the control's range and returns what was stored.
    fn set_value(&mut self, value: f64) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliderControl {
    value: f64,
    range: RangeInclusive<f64>,
    step: f64,
}

impl SliderControl {
    pub fn new(value: f64, range: RangeInclusive<f64>, step: f64) -> Self {
        let mut slider = Self {
            value: *range.start(),
            range,
            step,
        };
        slider.set_value(value);
        slider
    }

    pub fn for_parameter(parameter: FilterParameter) -> Self {
        Self::new(parameter.default_value(), parameter.range(), parameter.step())
    }

    pub fn range(&self) -> &RangeInclusive<f64> {
        &self.range
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// One decimal, as shown next to the slider.
    pub fn display_value(&self) -> String {
        format!("{:.1}", self.value)
    }
}

impl ParameterControl for SliderControl {
    fn value(&self) -> f64 {
        self.value
    }

    fn set_value(&mut self, value: f64) -> f64 {
        let value = if value.is_finite() { value } else { *self.range.start() };
        let snapped = if self.step > 0.0 {
            let steps = ((value - self.range.start()) / self.step).round();
            self.range.start() + steps * self.step
        } else {
            value
        };
        // Round away binary noise from the step multiplication (1.5000000000000002).
        let snapped = (snapped * 1e6).round() / 1e6;
        self.value = snapped.clamp(*self.range.start(), *self.range.end());
        self.value
    }
}

/// Typed registry of the controls the controller reads at submission time.
pub struct ParameterControls {
    contrast_factor: Box<dyn ParameterControl>,
    blur_radius: Box<dyn ParameterControl>,
    sharpen_factor: Box<dyn ParameterControl>,
}

impl ParameterControls {
    pub fn new(
        contrast_factor: impl ParameterControl + 'static,
        blur_radius: impl ParameterControl + 'static,
        sharpen_factor: impl ParameterControl + 'static,
    ) -> Self {
        Self {
            contrast_factor: Box::new(contrast_factor),
            blur_radius: Box::new(blur_radius),
            sharpen_factor: Box::new(sharpen_factor),
        }
    }

    /// Sliders initialised to the service defaults.
    pub fn sliders() -> Self {
        Self::new(
            SliderControl::for_parameter(FilterParameter::ContrastFactor),
            SliderControl::for_parameter(FilterParameter::BlurRadius),
            SliderControl::for_parameter(FilterParameter::SharpenFactor),
        )
    }

    pub fn get(&self, parameter: FilterParameter) -> &dyn ParameterControl {
        match parameter {
            FilterParameter::ContrastFactor => self.contrast_factor.as_ref(),
            FilterParameter::BlurRadius => self.blur_radius.as_ref(),
            FilterParameter::SharpenFactor => self.sharpen_factor.as_ref(),
        }
    }

    pub fn get_mut(&mut self, parameter: FilterParameter) -> &mut dyn ParameterControl {
        match parameter {
            FilterParameter::ContrastFactor => self.contrast_factor.as_mut(),
            FilterParameter::BlurRadius => self.blur_radius.as_mut(),
            FilterParameter::SharpenFactor => self.sharpen_factor.as_mut(),
        }
    }
}

impl Default for ParameterControls {
    fn default() -> Self {
        Self::sliders()
    }
}
