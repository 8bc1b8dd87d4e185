//! Built-in kana groups and pool construction from a group selection.

use std::collections::BTreeSet;

use crate::drill::ItemId;

#[derive(Debug, Clone, Copy)]
pub struct KanaGroup {
    pub name: &'static str,
    pub kana: &'static [&'static str],
    pub romaji: &'static [&'static str],
}

impl KanaGroup {
    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.kana.iter().map(|k| ItemId::from(*k))
    }

    /// Display name in the same shape the level picker uses, e.g. "あ-group".
    pub fn label(&self) -> String {
        format!("{}-group", self.kana.first().copied().unwrap_or("?"))
    }
}

const ROMAJI_A: &[&str] = &["a", "i", "u", "e", "o"];
const ROMAJI_KA: &[&str] = &["ka", "ki", "ku", "ke", "ko"];
const ROMAJI_SA: &[&str] = &["sa", "shi", "su", "se", "so"];
const ROMAJI_TA: &[&str] = &["ta", "chi", "tsu", "te", "to"];
const ROMAJI_NA: &[&str] = &["na", "ni", "nu", "ne", "no"];
const ROMAJI_HA: &[&str] = &["ha", "hi", "fu", "he", "ho"];
const ROMAJI_MA: &[&str] = &["ma", "mi", "mu", "me", "mo"];
const ROMAJI_YA: &[&str] = &["ya", "yu", "yo"];
const ROMAJI_RA: &[&str] = &["ra", "ri", "ru", "re", "ro"];
const ROMAJI_WA: &[&str] = &["wa", "wo", "n"];

const KANA_GROUPS: &[KanaGroup] = &[
    KanaGroup { name: "hiragana.a", kana: &["あ", "い", "う", "え", "お"], romaji: ROMAJI_A },
    KanaGroup { name: "hiragana.ka", kana: &["か", "き", "く", "け", "こ"], romaji: ROMAJI_KA },
    KanaGroup { name: "hiragana.sa", kana: &["さ", "し", "す", "せ", "そ"], romaji: ROMAJI_SA },
    KanaGroup { name: "hiragana.ta", kana: &["た", "ち", "つ", "て", "と"], romaji: ROMAJI_TA },
    KanaGroup { name: "hiragana.na", kana: &["な", "に", "ぬ", "ね", "の"], romaji: ROMAJI_NA },
    KanaGroup { name: "hiragana.ha", kana: &["は", "ひ", "ふ", "へ", "ほ"], romaji: ROMAJI_HA },
    KanaGroup { name: "hiragana.ma", kana: &["ま", "み", "む", "め", "も"], romaji: ROMAJI_MA },
    KanaGroup { name: "hiragana.ya", kana: &["や", "ゆ", "よ"], romaji: ROMAJI_YA },
    KanaGroup { name: "hiragana.ra", kana: &["ら", "り", "る", "れ", "ろ"], romaji: ROMAJI_RA },
    KanaGroup { name: "hiragana.wa", kana: &["わ", "を", "ん"], romaji: ROMAJI_WA },
    KanaGroup { name: "katakana.a", kana: &["ア", "イ", "ウ", "エ", "オ"], romaji: ROMAJI_A },
    KanaGroup { name: "katakana.ka", kana: &["カ", "キ", "ク", "ケ", "コ"], romaji: ROMAJI_KA },
    KanaGroup { name: "katakana.sa", kana: &["サ", "シ", "ス", "セ", "ソ"], romaji: ROMAJI_SA },
    KanaGroup { name: "katakana.ta", kana: &["タ", "チ", "ツ", "テ", "ト"], romaji: ROMAJI_TA },
    KanaGroup { name: "katakana.na", kana: &["ナ", "ニ", "ヌ", "ネ", "ノ"], romaji: ROMAJI_NA },
    KanaGroup { name: "katakana.ha", kana: &["ハ", "ヒ", "フ", "ヘ", "ホ"], romaji: ROMAJI_HA },
    KanaGroup { name: "katakana.ma", kana: &["マ", "ミ", "ム", "メ", "モ"], romaji: ROMAJI_MA },
    KanaGroup { name: "katakana.ya", kana: &["ヤ", "ユ", "ヨ"], romaji: ROMAJI_YA },
    KanaGroup { name: "katakana.ra", kana: &["ラ", "リ", "ル", "レ", "ロ"], romaji: ROMAJI_RA },
    KanaGroup { name: "katakana.wa", kana: &["ワ", "ヲ", "ン"], romaji: ROMAJI_WA },
];

pub fn kana_groups() -> &'static [KanaGroup] {
    KANA_GROUPS
}

/// Pool for the selected group indices. Indices outside the catalog are
/// skipped.
pub fn pool_from_groups(indices: &[usize]) -> BTreeSet<ItemId> {
    indices
        .iter()
        .filter_map(|&i| {
            let group = KANA_GROUPS.get(i);
            if group.is_none() {
                tracing::debug!(index = i, "ignoring unknown kana group");
            }
            group
        })
        .flat_map(|group| group.items())
        .collect()
}

pub fn romaji_for(kana: &ItemId) -> Option<&'static str> {
    KANA_GROUPS.iter().find_map(|group| {
        group
            .kana
            .iter()
            .position(|k| *k == kana.as_str())
            .and_then(|pos| group.romaji.get(pos).copied())
    })
}
