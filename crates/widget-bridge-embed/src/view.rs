//! What the host should render for an embed.

use widget_bridge_frame::escape_attr;

/// Sandbox flags applied to every widget frame.
pub const FRAME_SANDBOX: &str = "allow-scripts allow-same-origin allow-forms allow-popups";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedView {
    /// Not ready yet: a placeholder of the inline height, or the caller's fallback.
    Loading { height: String, fallback: Option<String> },
    Frame(FrameView),
    Unmounted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameView {
    pub src: String,
    /// The output-template URI, when the metadata names one.
    pub title: Option<String>,
    pub sandbox: &'static str,
    pub height: String,
    pub fullscreen: bool,
    /// Whether the exit-fullscreen overlay control is shown.
    pub exit_control: bool,
}

impl FrameView {
    /// Markup for the frame element.
    pub fn iframe_html(&self) -> String {
        let title = self
            .title
            .as_deref()
            .map(|t| format!(r#" title="{}""#, escape_attr(t)))
            .unwrap_or_default();
        format!(
            r#"<iframe src="{}"{title} sandbox="{}" style="width:100%;height:{};border:0;"></iframe>"#,
            escape_attr(&self.src),
            self.sandbox,
            escape_attr(&self.height),
        )
    }
}
