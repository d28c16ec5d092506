// fonts.rs — pick a system font that can draw non-Latin UI strings
//
// egui's bundled fonts only cover Latin/Greek/Cyrillic basics. For other UI
// languages the first parsable font from the system or ./assets is installed
// ahead of the defaults. ab_glyph's .ttc support is partial, so .ttf/.otf come
// first and unparsable files are skipped.

use std::path::{Path, PathBuf};

const ASSET_FONTS: [&str; 5] = [
    "NotoSansCJK-Regular.ttc",
    "NotoSansSC-Regular.otf",
    "NotoSansJP-Regular.otf",
    "NotoSansKR-Regular.otf",
    "NotoSansArabic-Regular.ttf",
];

/// Languages the default egui fonts already render.
pub fn needs_extra_font(lang: &str) -> bool {
    !matches!(lang.split(['-', '_']).next(), Some("en" | "fr" | "de" | "es" | "it" | "ru"))
}

pub fn font_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if cfg!(windows) {
        let dir = PathBuf::from(r"C:\Windows\Fonts");
        for f in ["msyh.ttf", "simhei.ttf", "Deng.ttf", "meiryo.ttf", "malgun.ttf", "arialuni.ttf"] {
            candidates.push(dir.join(f));
        }
    } else if cfg!(target_os = "macos") {
        for f in [
            "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
            "/Library/Fonts/NotoSansSC-Regular.otf",
            "/Library/Fonts/NotoSansJP-Regular.otf",
            "/System/Library/Fonts/PingFang.ttc",
            "/System/Library/Fonts/Hiragino Sans GB.ttc",
        ] {
            candidates.push(PathBuf::from(f));
        }
    } else if cfg!(unix) {
        for f in [
            "/usr/share/fonts/opentype/noto/NotoSansSC-Regular.otf",
            "/usr/share/fonts/truetype/noto/NotoSansSC-Regular.ttf",
            "/usr/share/fonts/opentype/noto/NotoSansJP-Regular.otf",
            "/usr/share/fonts/truetype/noto/NotoSansArabic-Regular.ttf",
            "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
        ] {
            candidates.push(PathBuf::from(f));
        }
        if let Ok(home) = std::env::var("HOME") {
            let home = PathBuf::from(home);
            candidates.push(home.join(".local/share/fonts/NotoSansCJK-Regular.ttc"));
            candidates.push(home.join(".fonts/NotoSansCJK-Regular.ttc"));
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.extend(ASSET_FONTS.iter().map(|f| dir.join("assets").join(f)));
        }
    }
    candidates.extend(ASSET_FONTS.iter().map(|f| PathBuf::from("assets").join(f)));
    candidates
}

pub fn try_load_font(path: &Path) -> Option<Vec<u8>> {
    let bytes = std::fs::read(path).ok()?;
    ab_glyph::FontRef::try_from_slice(&bytes).ok()?;
    Some(bytes)
}

pub fn install_ui_font(ctx: &egui::Context, lang: &str) {
    if !needs_extra_font(lang) {
        return;
    }

    let Some((path, bytes)) = font_candidates()
        .into_iter()
        .find_map(|p| try_load_font(&p).map(|b| (p, b)))
    else {
        log::warn!("{}", crate::i18n::tr("font.not_found"));
        return;
    };
    log::info!("using UI font {}", path.display());

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("ui".to_owned(), egui::FontData::from_owned(bytes));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        if let Some(list) = fonts.families.get_mut(&family) {
            list.insert(0, "ui".to_owned());
        }
    }
    ctx.set_fonts(fonts);
}
