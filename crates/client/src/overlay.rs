use chrono::{DateTime, Utc};
use domain::{CommentStatus, CommentWithReplies};

// 页面坐标，不随滚动变化
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePoint {
    pub x: f64,
    pub y: f64,
}

impl PagePoint {
    pub fn from_viewport(client_x: f64, client_y: f64, scroll_x: f64, scroll_y: f64) -> Self {
        Self {
            x: client_x + scroll_x,
            y: client_y + scroll_y,
        }
    }

    pub fn to_viewport(self, scroll_x: f64, scroll_y: f64) -> (f64, f64) {
        (self.x - scroll_x, self.y - scroll_y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinStyle {
    Open,
    Resolved,
    Hidden,
}

impl PinStyle {
    pub fn for_status(status: CommentStatus) -> Self {
        match status {
            CommentStatus::Open => Self::Open,
            CommentStatus::Resolved => Self::Resolved,
            CommentStatus::Deleted => Self::Hidden,
        }
    }

    pub fn color(self) -> Option<&'static str> {
        match self {
            Self::Open => Some("#ef4444"),
            Self::Resolved => Some("#22c55e"),
            Self::Hidden => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pin<'a> {
    pub comment: &'a CommentWithReplies,
    pub at: PagePoint,
    pub style: PinStyle,
}

pub fn visible_pins(comments: &[CommentWithReplies]) -> Vec<Pin<'_>> {
    comments
        .iter()
        .filter(|c| !c.comment.status.is_deleted())
        .map(|c| Pin {
            comment: c,
            at: PagePoint {
                x: c.comment.x,
                y: c.comment.y,
            },
            style: PinStyle::for_status(c.comment.status),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SidebarFilter {
    All,
    #[default]
    Open,
    Resolved,
}

impl SidebarFilter {
    fn admits(self, status: CommentStatus) -> bool {
        match self {
            Self::All => true,
            Self::Open => status == CommentStatus::Open,
            Self::Resolved => status == CommentStatus::Resolved,
        }
    }
}

pub fn sidebar(comments: &[CommentWithReplies], filter: SidebarFilter) -> Vec<&CommentWithReplies> {
    let mut listed: Vec<&CommentWithReplies> = comments
        .iter()
        .filter(|c| !c.comment.status.is_deleted())
        .filter(|c| filter.admits(c.comment.status))
        .collect();
    listed.sort_by(|a, b| b.comment.created_at.cmp(&a.comment.created_at));
    listed
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardSize {
    pub width: f64,
    pub height: f64,
}

pub const HOVER_CARD: CardSize = CardSize {
    width: 300.0,
    height: 150.0,
};
pub const HOVER_MARGIN: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAnchor {
    Above,
    Below,
    Centered,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverPlacement {
    pub left: f64,
    pub top: f64,
    pub anchor: VerticalAnchor,
}

/// `pin` is in viewport coordinates; `left` of the result is the card's
/// horizontal centre.
pub fn hover_card_placement(
    pin: (f64, f64),
    viewport: (f64, f64),
    card: CardSize,
) -> HoverPlacement {
    let (x, y) = pin;
    let (vw, vh) = viewport;

    // 上方放不下就放下方，都不行就居中
    let (top, anchor) = if y - card.height - HOVER_MARGIN > 0.0 {
        (y, VerticalAnchor::Above)
    } else if y + card.height + HOVER_MARGIN < vh {
        (y, VerticalAnchor::Below)
    } else {
        (y.max(HOVER_MARGIN).min(vh - HOVER_MARGIN), VerticalAnchor::Centered)
    };

    let half = card.width / 2.0;
    let left = if x + half + HOVER_MARGIN > vw {
        vw - half - HOVER_MARGIN
    } else if x - half - HOVER_MARGIN < 0.0 {
        half + HOVER_MARGIN
    } else {
        x
    };

    HoverPlacement { left, top, anchor }
}

/// `None` when the pin is already on screen.
pub fn scroll_to_reveal(pin_y: f64, scroll_y: f64, viewport_height: f64) -> Option<f64> {
    if pin_y < scroll_y || pin_y > scroll_y + viewport_height {
        Some((pin_y - viewport_height / 3.0).max(0.0))
    } else {
        None
    }
}

pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    let units = [
        (31_536_000, "year"),
        (2_592_000, "month"),
        (86_400, "day"),
        (3_600, "hour"),
        (60, "minute"),
    ];
    for (size, name) in units {
        let n = seconds / size;
        if n >= 1 {
            return format!("{} {}{} ago", n, name, if n > 1 { "s" } else { "" });
        }
    }
    "Just now".to_string()
}
