use super::*;

#[test]
fn toggle_flips_theme() {
    assert_eq!(Theme::Light.toggled(), Theme::Dark);
    assert_eq!(Theme::Dark.toggled(), Theme::Light);
}

#[test]
fn parse_accepts_either_case() {
    assert_eq!("Dark".parse::<Theme>(), Ok(Theme::Dark));
    assert_eq!(" light ".parse::<Theme>(), Ok(Theme::Light));
    assert!("sepia".parse::<Theme>().is_err());
}

#[test]
fn load_without_store_uses_default() {
    let state = ThemeState::load(Theme::Dark, None);
    assert_eq!(state.get(), Theme::Dark);
}

#[test]
fn load_missing_file_uses_default() {
    let dir = tempfile::tempdir().unwrap();
    let state = ThemeState::load(Theme::Light, Some(dir.path().join("theme")));
    assert_eq!(state.get(), Theme::Light);
}

#[test]
fn toggle_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("theme");

    let state = ThemeState::load(Theme::Light, Some(path.clone()));
    assert_eq!(state.toggle(), Theme::Dark);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "dark");

    let reloaded = ThemeState::load(Theme::Light, Some(path));
    assert_eq!(reloaded.get(), Theme::Dark);
}

#[test]
fn corrupt_store_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("theme");
    std::fs::write(&path, "chartreuse").unwrap();
    assert_eq!(ThemeState::load(Theme::Dark, Some(path)).get(), Theme::Dark);
}

#[test]
fn subscribers_see_changes() {
    let state = ThemeState::load(Theme::Light, None);
    let mut rx = state.subscribe();
    state.set(Theme::Dark);
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), Theme::Dark);
}

#[test]
fn unwritable_store_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let state = ThemeState::load(Theme::Light, Some(dir.path().join("missing-dir").join("theme")));
    assert_eq!(state.toggle(), Theme::Dark);
    assert_eq!(state.get(), Theme::Dark);
}
