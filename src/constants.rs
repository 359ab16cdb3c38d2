/// Competition constants shared across the scraper, cursor and pipeline.

/// Earliest season the pipeline collects.
pub const MIN_YEAR: i32 = 2014;

/// Teams in the competition; one ladder row each.
pub const NUM_TEAMS: usize = 18;

/// Home-and-away rounds per season.
pub const SEASON_ROUNDS: u32 = 23;

/// Days between consecutive rounds.
pub const ROUND_CADENCE_DAYS: i64 = 7;

/// Month/day of the pre-season anchor used after the last round.
pub const PRESEASON_ANCHOR: (u32, u32) = (3, 1);

/// Kickoff format as printed on season pages: `Sat 04-Apr-2015 07:40 PM`.
pub const PAGE_KICKOFF_FORMAT: &str = "%a %d-%b-%Y %I:%M %p";

/// Kickoff format persisted in the sink and staging artifacts.
pub const STORED_KICKOFF_FORMAT: &str = "%Y-%m-%d %H:%M";

/// CLI date arguments.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DEFAULT_SEASON_URL_BASE: &str = "https://afltables.com/afl/seas/";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/56.0.2924.76 Safari/537.36";

/// Away team recorded for a bye.
pub const BYE_TEAM: &str = "Bye";

// Block markers on season pages
pub const FINALS_MARKER: &str = "Finals";
pub const ROUND_MARKER: &str = "Round";
pub const LADDER_MARKER: &str = "Ladder";

/// Teams missing from the source page that must be recorded as byes.
/// 2015 round 14 produced no blocks at all for these two clubs.
pub const BUILTIN_BYE_OVERRIDES: &[(i32, u32, &str)] = &[
    (2015, 14, "Adelaide"),
    (2015, 14, "Geelong"),
];

/// Bookmaker spellings mapped onto the names used by the season pages.
pub const TEAM_ALIASES: &[(&str, &str)] = &[
    ("Port Adelaide Power", "Port Adelaide"),
    ("Adelaide Crows", "Adelaide"),
    ("Melbourne Demons", "Melbourne"),
    ("Gold Coast Suns", "Gold Coast"),
    ("Geelong Cats", "Geelong"),
    ("Sydney Swans", "Sydney"),
    ("GWS Giants", "Greater Western Sydney"),
    ("GWS", "Greater Western Sydney"),
    ("West Coast Eagles", "West Coast"),
    ("Brisbane", "Brisbane Lions"),
];

/// Map a bookmaker team name onto the canonical season-page name.
pub fn canonical_team_name(name: &str) -> String {
    let trimmed = name.trim();
    TEAM_ALIASES
        .iter()
        .find(|(alias, _)| *alias == trimmed)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}
