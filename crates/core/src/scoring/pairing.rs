/// Static frequently-paired categories, used when no co-occurrence history exists.
const FREQUENTLY_PAIRED: &[(&str, &[&str])] = &[
    ("electronics", &["Fitness", "Home Decor"]),
    ("fashion", &["Beauty", "Fitness"]),
    ("books", &["Home Decor", "Electronics"]),
    ("home decor", &["Books", "Beauty"]),
    ("beauty", &["Fashion", "Home Decor"]),
    ("fitness", &["Electronics", "Fashion"]),
];

pub fn frequently_paired(category: &str) -> &'static [&'static str] {
    let key = category.trim().to_ascii_lowercase();
    FREQUENTLY_PAIRED
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, paired)| *paired)
        .unwrap_or(&[])
}
