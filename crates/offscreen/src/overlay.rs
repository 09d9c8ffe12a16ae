use renderer::Colorspace;

/// Text overlay settings consumed by the frame compositor.
///
/// The overlay tracks the output colorspace separately so text colour can be
/// encoded to match the frame; the `colorspace` command keeps the two in step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    text: String,
    colorspace: Colorspace,
}

impl Overlay {
    pub fn new(text: impl Into<String>, colorspace: Colorspace) -> Self {
        Self {
            text: text.into(),
            colorspace,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        tracing::debug!(text = %self.text, "overlay text updated");
    }

    #[cfg(test)]
    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    pub fn set_colorspace(&mut self, colorspace: Colorspace) {
        self.colorspace = colorspace;
    }
}
