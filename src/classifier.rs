//! Classification of domains into [Category]. Both the tracking pipeline and the reports use this
//! module, so a domain is colored the same way everywhere.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Productive,
    Unproductive,
    Neutral,
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Productive => write!(f, "productive"),
            Category::Unproductive => write!(f, "unproductive"),
            Category::Neutral => write!(f, "neutral"),
        }
    }
}

pub const PRODUCTIVE_SITES: &[&str] = &[
    "github.com",
    "stackoverflow.com",
    "developer.mozilla.org",
    "w3schools.com",
    "leetcode.com",
    "hackerrank.com",
    "codewars.com",
    "freecodecamp.org",
    "udemy.com",
    "coursera.org",
    "edx.org",
    "khanacademy.org",
    "google.com",
    "bing.com",
    "wikipedia.org",
    "medium.com",
    "dev.to",
    "hashnode.dev",
    "css-tricks.com",
    "smashingmagazine.com",
];

pub const UNPRODUCTIVE_SITES: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "tiktok.com",
    "youtube.com",
    "netflix.com",
    "reddit.com",
    "pinterest.com",
    "snapchat.com",
    "discord.com",
    "twitch.tv",
    "spotify.com",
];

/// Classifies a hostname. An entry matches when it is contained anywhere in `domain`, so
/// `gist.github.com` is productive as well. The productive list is checked first, which means it
/// wins if a domain happens to match both lists.
pub fn classify(domain: &str) -> Category {
    if PRODUCTIVE_SITES.iter().any(|site| domain.contains(site)) {
        Category::Productive
    } else if UNPRODUCTIVE_SITES.iter().any(|site| domain.contains(site)) {
        Category::Unproductive
    } else {
        Category::Neutral
    }
}
