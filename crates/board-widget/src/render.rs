use chrono::{DateTime, FixedOffset, Local, Utc};

use board_types::api::{BoardView, SubmitControl};
use board_types::models::Comment;

use crate::board::{BUSY_LABEL, BoardState, SUBMIT_LABEL};
use crate::escape::escape_html;

/// Hour style for comment time labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStyle {
    TwelveHour,
    TwentyFourHour,
}

impl ClockStyle {
    /// `BOARD_CLOCK=12h|24h` wins; otherwise the locale in `LC_TIME`, `LC_ALL`
    /// or `LANG` decides.
    pub fn from_env() -> Self {
        if let Ok(value) = std::env::var("BOARD_CLOCK") {
            match value.trim() {
                "12h" => return Self::TwelveHour,
                "24h" => return Self::TwentyFourHour,
                other => tracing::warn!("Ignoring unknown BOARD_CLOCK value '{}'", other),
            }
        }
        ["LC_TIME", "LC_ALL", "LANG"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .map(|locale| Self::from_locale(&locale))
            .unwrap_or(Self::TwentyFourHour)
    }

    /// Locales that conventionally show AM/PM.
    pub fn from_locale(locale: &str) -> Self {
        const TWELVE_HOUR: &[&str] = &["en_US", "en_CA", "en_AU", "en_NZ", "en_PH", "en_IN", "es_MX", "es_US"];
        let tag = locale.split('.').next().unwrap_or(locale).replace('-', "_");
        if TWELVE_HOUR.iter().any(|prefix| tag.starts_with(prefix)) {
            Self::TwelveHour
        } else {
            Self::TwentyFourHour
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            Self::TwelveHour => "%I:%M %p",
            Self::TwentyFourHour => "%H:%M",
        }
    }
}

/// Zone a time label converts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelZone {
    /// Host zone, with the offset in force on each timestamp's own date.
    Local,
    Fixed(FixedOffset),
}

/// Formats server timestamps as a local time of day.
#[derive(Debug, Clone, Copy)]
pub struct TimeLabel {
    zone: LabelZone,
    style: ClockStyle,
}

impl TimeLabel {
    pub fn local(style: ClockStyle) -> Self {
        Self {
            zone: LabelZone::Local,
            style,
        }
    }

    pub fn fixed(offset: FixedOffset, style: ClockStyle) -> Self {
        Self {
            zone: LabelZone::Fixed(offset),
            style,
        }
    }

    /// No timestamp yields an empty label.
    pub fn format(&self, ts: Option<DateTime<Utc>>) -> String {
        let Some(ts) = ts else {
            return String::new();
        };
        let pattern = self.style.pattern();
        match self.zone {
            LabelZone::Local => ts.with_timezone(&Local).format(pattern).to_string(),
            LabelZone::Fixed(offset) => ts.with_timezone(&offset).format(pattern).to_string(),
        }
    }
}

pub fn render_comment(comment: &Comment, time: &TimeLabel) -> String {
    format!(
        r#"<div class="comment-item">
    <div class="comment-header">
        <span class="comment-user">{}</span>
        <span class="comment-time">{}</span>
    </div>
    <div class="comment-body">
        {}
    </div>
</div>
"#,
        escape_html(&comment.author),
        time.format(comment.created_at),
        escape_html(&comment.body),
    )
}

/// Markup for the whole list, in snapshot order.
pub fn render_list(comments: &[Comment], time: &TimeLabel) -> String {
    comments.iter().map(|c| render_comment(c, time)).collect()
}

pub fn render(state: &BoardState, time: &TimeLabel) -> BoardView {
    BoardView {
        list_html: render_list(&state.comments, time),
        viewer_count: state
            .viewer_count
            .map(|n| n.to_string())
            .unwrap_or_default(),
        submit: SubmitControl {
            disabled: state.submitting,
            label: if state.submitting { BUSY_LABEL } else { SUBMIT_LABEL }.to_string(),
        },
        form: state.form.clone(),
    }
}
