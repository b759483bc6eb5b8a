use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

pub struct SeedCategory {
    pub name: &'static str,
    pub slug: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

#[rustfmt::skip]
pub const SEED_CATEGORIES: &[SeedCategory] = &[
    SeedCategory { name: "Translation", slug: "translation", description: "Translate texts, documents, and books accurately", icon: "languages", color: "#6366f1" },
    SeedCategory { name: "Proofreading", slug: "proofreading", description: "Fix grammar, spelling, and clarity issues", icon: "spell-check", color: "#6366f1" },
    SeedCategory { name: "Content Writing", slug: "content-writing", description: "Write articles, posts, and written content", icon: "file-text", color: "#6366f1" },
    SeedCategory { name: "Resume & CV", slug: "resume-cv", description: "Create or improve resumes and CVs", icon: "file-user", color: "#6366f1" },
    SeedCategory { name: "Transcription", slug: "transcription", description: "Convert audio or video into text", icon: "audio-lines", color: "#6366f1" },
    SeedCategory { name: "Logo Design", slug: "logo-design", description: "Design professional and modern logos", icon: "pen-tool", color: "#ec4899" },
    SeedCategory { name: "Brand Identity", slug: "brand-identity", description: "Visual identity and branding assets", icon: "palette", color: "#ec4899" },
    SeedCategory { name: "Social Media Design", slug: "social-media-design", description: "Design posts and creatives for social networks", icon: "instagram", color: "#ec4899" },
    SeedCategory { name: "Presentation Design", slug: "presentation-design", description: "Design clean and professional presentations", icon: "presentation", color: "#ec4899" },
    SeedCategory { name: "Thumbnail Design", slug: "thumbnail-design", description: "Create eye-catching thumbnails", icon: "image", color: "#ec4899" },
    SeedCategory { name: "Bug Fixing", slug: "bug-fixing", description: "Fix bugs and small issues in your code", icon: "bug", color: "#22c55e" },
    SeedCategory { name: "Small Features", slug: "small-features", description: "Add small features to existing projects", icon: "plus-circle", color: "#22c55e" },
    SeedCategory { name: "API Integration", slug: "api-integration", description: "Integrate third-party APIs", icon: "plug", color: "#22c55e" },
    SeedCategory { name: "Automation Scripts", slug: "automation-scripts", description: "Automate repetitive tasks", icon: "bot", color: "#22c55e" },
    SeedCategory { name: "Website Setup", slug: "website-setup", description: "Set up small websites or landing pages", icon: "globe", color: "#22c55e" },
    SeedCategory { name: "Video Editing", slug: "video-editing", description: "Edit short videos and clips", icon: "video", color: "#f59e0b" },
    SeedCategory { name: "Short Form Videos", slug: "short-form-videos", description: "Create Reels, TikToks, and Shorts", icon: "clapperboard", color: "#f59e0b" },
    SeedCategory { name: "Audio Editing", slug: "audio-editing", description: "Edit podcasts and audio files", icon: "mic", color: "#f59e0b" },
    SeedCategory { name: "Voice Over", slug: "voice-over", description: "Record voice overs for videos or ads", icon: "volume-2", color: "#f59e0b" },
    SeedCategory { name: "AI Content", slug: "ai-content", description: "Generate AI-powered content", icon: "sparkles", color: "#8b5cf6" },
    SeedCategory { name: "Chatbot Setup", slug: "chatbot-setup", description: "Set up simple AI chatbots", icon: "message-circle", color: "#8b5cf6" },
    SeedCategory { name: "Prompt Engineering", slug: "prompt-engineering", description: "Optimize prompts for AI tools", icon: "terminal", color: "#8b5cf6" },
    SeedCategory { name: "Data Entry", slug: "data-entry", description: "Enter and organize data accurately", icon: "table", color: "#0ea5e9" },
    SeedCategory { name: "Excel & Sheets", slug: "excel-sheets", description: "Create spreadsheets and formulas", icon: "sheet", color: "#0ea5e9" },
    SeedCategory { name: "Web Research", slug: "web-research", description: "Research information online", icon: "search", color: "#0ea5e9" },
    SeedCategory { name: "Virtual Assistant", slug: "virtual-assistant", description: "Administrative and online assistance", icon: "user-check", color: "#14b8a6" },
    SeedCategory { name: "Online Tutoring", slug: "online-tutoring", description: "Teach or tutor online", icon: "graduation-cap", color: "#14b8a6" },
    SeedCategory { name: "Homework Help", slug: "homework-help", description: "Help with assignments and exercises", icon: "book-open", color: "#14b8a6" },
];

/// Replace the category table with [`SEED_CATEGORIES`]. Fails while any
/// service still references a category.
pub async fn seed_categories(db: &PgPool) -> anyhow::Result<usize> {
    let mut tx = db.begin().await.context("begin tx")?;
    let removed = sqlx::query("DELETE FROM categories")
        .execute(&mut *tx)
        .await
        .context("clear categories")?
        .rows_affected();

    for c in SEED_CATEGORIES {
        sqlx::query(
            r#"
            INSERT INTO categories (name, slug, description, icon, color)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(c.name)
        .bind(c.slug)
        .bind(c.description)
        .bind(c.icon)
        .bind(c.color)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("insert category {}", c.slug))?;
    }
    tx.commit().await.context("commit tx")?;

    info!(removed, inserted = SEED_CATEGORIES.len(), "categories seeded");
    Ok(SEED_CATEGORIES.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::dto::{is_valid_slug, slugify};
    use std::collections::HashSet;

    #[test]
    fn seed_slugs_are_unique_and_valid() {
        let mut seen = HashSet::new();
        for c in SEED_CATEGORIES {
            assert!(is_valid_slug(c.slug), "bad slug {}", c.slug);
            assert!(seen.insert(c.slug), "duplicate slug {}", c.slug);
            assert!(c.color.starts_with('#') && c.color.len() == 7);
        }
        assert_eq!(SEED_CATEGORIES.len(), 28);
    }

    #[test]
    fn seed_slugs_follow_names() {
        for c in SEED_CATEGORIES {
            assert_eq!(slugify(c.name), c.slug, "slug for {}", c.name);
        }
    }
}
