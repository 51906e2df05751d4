use anyhow::Context;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use client::overlay::{sidebar, time_ago, PagePoint, SidebarFilter};
use client::prefs::{default_path, DEFAULT_USER_NAME};
use client::{CommentsSession, HttpApi, LocalPrefs};
use domain::ReplyDraft;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_PAGE: &str = "home";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let base_url = std::env::var("PINBOARD_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let page = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_PAGE.to_string());

    let api = HttpApi::new(&base_url).context("Failed to build HTTP client")?;
    let mut prefs = match default_path() {
        Some(path) => LocalPrefs::load(path),
        None => LocalPrefs::in_memory(),
    };
    // 第一次运行时写入名字，之后沿用保存的
    if prefs.user_name() == DEFAULT_USER_NAME {
        prefs.set_user_name("Ferris")?;
    }
    println!(
        "Starting pinboard smoke test against {} as {}...",
        base_url,
        prefs.user_name()
    );
    let mut session = CommentsSession::new(api, prefs);

    println!("\n[1/4] Loading page '{}'...", page);
    let start = Instant::now();
    session
        .initialize_page(&page)
        .await
        .with_context(|| format!("Failed to load comments for {}", page))?;
    println!(
        "   -> {} existing comment(s) in {:.2?}",
        session.comments().len(),
        start.elapsed()
    );

    println!("\n[2/4] Dropping a pin...");
    let point = PagePoint::from_viewport(120.0, 80.0, 0.0, 640.0);
    let draft = session.draft_at("This is a message from the pinboard smoke test!", point);
    let created = session.add(&draft).await.context("Failed to add comment")?;
    println!("   -> ✅ Created {} at ({}, {})", created.id(), point.x, point.y);

    println!("\n[3/4] Replying...");
    let draft = ReplyDraft::new("And a reply to it.", session.user_name());
    let reply = session
        .reply(created.id(), &draft)
        .await
        .context("Failed to add reply")?;
    println!("   -> ✅ Reply {}", reply.id);

    println!("\n[4/4] Reloading...");
    session.load(&page).await.context("Failed to reload comments")?;

    let now = chrono::Utc::now();
    let listed = sidebar(session.comments(), SidebarFilter::All);
    println!("   -> Retrieved {} comment(s):", listed.len());
    for c in listed {
        println!(
            "      - [{}] {} ({}): {} [{} repl(ies)]",
            time_ago(c.comment.created_at, now),
            c.comment.user,
            c.comment.status,
            c.comment.text,
            c.replies.len()
        );
    }

    Ok(())
}
