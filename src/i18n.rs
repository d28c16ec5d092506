// i18n.rs — runtime UI strings
//
// Strings live in either:
//   A) assets/i18n/<lang>.json
//   B) assets/i18n.json (single file: { "<lang>": { "key": "value" } })
// Lookup order: selected lang -> bundled English -> the key itself.
// Placeholders use {name}: tr_with("error.load_failed", &[("err", msg)]).

use once_cell::sync::{Lazy, OnceCell};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

const FALLBACK_LANG: &str = "en";

static BUNDLED_EN: Lazy<HashMap<String, String>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../assets/i18n/en.json")).unwrap_or_else(|e| {
        log::error!("bundled English strings are malformed: {}", e);
        HashMap::new()
    })
});

#[derive(Debug, Clone)]
struct Strings {
    lang: String,
    map: HashMap<String, String>,
}

static I18N: OnceCell<RwLock<Strings>> = OnceCell::new();

fn load_json_map(path: &Path) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(map) => Some(map),
        Err(e) => {
            log::warn!("ignoring {}: {}", path.display(), e);
            None
        }
    }
}

fn load_multi_lang_json(path: &Path, lang: &str) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut all: HashMap<String, HashMap<String, String>> = serde_json::from_str(&text).ok()?;
    all.remove(lang)
}

/// `<exe_dir>/assets/<rel>` first, then `./assets/<rel>`.
fn find_asset(rel: &Path) -> Option<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    exe_dir
        .into_iter()
        .chain(std::iter::once(PathBuf::from(".")))
        .map(|dir| dir.join("assets").join(rel))
        .find(|p| p.exists())
}

fn load_lang(lang: &str) -> HashMap<String, String> {
    let per_lang = Path::new("i18n").join(format!("{}.json", lang));
    if let Some(m) = find_asset(&per_lang).and_then(|p| load_json_map(&p)) {
        return m;
    }
    if let Some(m) = find_asset(Path::new("i18n.json")).and_then(|p| load_multi_lang_json(&p, lang)) {
        return m;
    }
    if lang != FALLBACK_LANG {
        log::info!("no strings for {:?}, using English", lang);
    }
    HashMap::new()
}

/// Select the UI language. Later calls replace the current strings.
pub fn init(lang: impl Into<String>) {
    let lang = lang.into();
    let strings = Strings {
        map: load_lang(&lang),
        lang,
    };

    if let Some(lock) = I18N.get() {
        if let Ok(mut w) = lock.write() {
            *w = strings;
        }
    } else {
        let _ = I18N.set(RwLock::new(strings));
    }
}

pub fn current_lang() -> String {
    I18N.get()
        .and_then(|l| l.read().ok().map(|s| s.lang.clone()))
        .unwrap_or_else(|| FALLBACK_LANG.to_string())
}

/// Localized text for `key`; the key itself if no table has it.
pub fn tr(key: &str) -> String {
    let selected = I18N
        .get()
        .and_then(|l| l.read().ok())
        .and_then(|s| s.map.get(key).cloned());

    selected
        .or_else(|| BUNDLED_EN.get(key).cloned())
        .unwrap_or_else(|| key.to_string())
}

/// `tr` with `{name}` placeholders substituted. Unknown placeholders are kept.
pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    let mut s = tr(key);
    for (k, v) in args {
        s = s.replace(&format!("{{{}}}", k), v);
    }
    s
}
