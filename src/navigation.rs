use std::collections::VecDeque;

use crate::address;
use crate::entry::{self, Entry};
use crate::gopher::FetchResult;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Error: {0}")]
    Parse(#[from] entry::ParseError),
    #[error("Error: no previous page")]
    NoPrevious,
    #[error("Error: no next page")]
    NoNext,
    #[error("Error: nothing selectable")]
    NothingSelectable,
    #[error("Error: cannot follow a non-gopher item")]
    NotFollowable,
    #[error("Error: selected item has no address")]
    MissingAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Content {
    #[default]
    Empty,
    Menu(Vec<Entry>),
    Html(Vec<String>),
}

impl Content {
    pub fn len(&self) -> usize {
        match self {
            Content::Empty => 0,
            Content::Menu(entries) => entries.len(),
            Content::Html(lines) => lines.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Menus only select links; any line of an HTML page can be selected.
    fn is_selectable(&self, index: usize) -> bool {
        match self {
            Content::Empty => false,
            Content::Menu(entries) => entries.get(index).is_some_and(Entry::is_link),
            Content::Html(lines) => index < lines.len(),
        }
    }
}

/// What the outstanding fetch was issued for. Decides where the page being
/// left goes in history once the fetch succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Open,
    Back(String),
    Forward(String),
    Reload,
}

/// Current page, selection and back/forward history. Every history address
/// carries the cursor it was left with (`l`, 1-based, 0 for none).
#[derive(Debug, Clone)]
pub struct Navigation {
    current_address: String,
    content: Content,
    cursor: Option<usize>,
    history_before: VecDeque<String>,
    history_after: VecDeque<String>,
    pending: Option<Step>,
}

impl Navigation {
    pub fn new<S: Into<String>>(initial_address: S) -> Self {
        Self {
            current_address: initial_address.into(),
            content: Content::Empty,
            cursor: None,
            history_before: VecDeque::new(),
            history_after: VecDeque::new(),
            pending: None,
        }
    }

    pub fn current_address(&self) -> &str {
        &self.current_address
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn history_before(&self) -> &VecDeque<String> {
        &self.history_before
    }

    pub fn history_after(&self) -> &VecDeque<String> {
        &self.history_after
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts a fresh navigation to `address`.
    pub fn open<S: Into<String>>(&mut self, address: S) -> String {
        self.begin(Step::Open);
        address.into()
    }

    /// Re-requests the current page, keeping the selection.
    pub fn reload(&mut self) -> String {
        self.begin(Step::Reload);
        if matches!(self.content, Content::Empty) {
            self.current_address.clone()
        } else {
            address::with_line(&self.current_address, self.saved_line())
        }
    }

    pub fn go_back(&mut self) -> Result<String, NavigationError> {
        let previous = self
            .history_before
            .pop_front()
            .ok_or(NavigationError::NoPrevious)?;
        self.begin(Step::Back(previous.clone()));
        Ok(previous)
    }

    pub fn go_forward(&mut self) -> Result<String, NavigationError> {
        let next = self
            .history_after
            .pop_front()
            .ok_or(NavigationError::NoNext)?;
        self.begin(Step::Forward(next.clone()));
        Ok(next)
    }

    /// Address of the selected entry, recorded as a fresh navigation.
    pub fn follow_selection(&mut self) -> Result<String, NavigationError> {
        let index = self.cursor.ok_or(NavigationError::NothingSelectable)?;
        let entry = match &self.content {
            Content::Menu(entries) => entries.get(index),
            Content::Empty | Content::Html(_) => None,
        }
        .ok_or(NavigationError::NotFollowable)?;
        if !entry.is_link() {
            return Err(NavigationError::NotFollowable);
        }
        let target = entry
            .address()
            .ok_or(NavigationError::MissingAddress)?
            .to_string();
        Ok(self.open(target))
    }

    /// Forgets the outstanding step, giving back any history it consumed.
    pub fn abandon(&mut self) {
        if let Some(step) = self.pending.take() {
            self.restore(step);
        }
    }

    /// Moves the cursor to the next selectable index in `direction`. The
    /// cursor stays put when there is none; there is no wraparound.
    pub fn select_link(&mut self, direction: isize) -> bool {
        if direction == 0 {
            return false;
        }
        let len = self.content.len() as isize;
        let mut index = self.cursor.map_or(-1, |cursor| cursor as isize) + direction;
        while (0..len).contains(&index) {
            if self.content.is_selectable(index as usize) {
                self.cursor = Some(index as usize);
                return true;
            }
            index += direction;
        }
        false
    }

    /// Takes in the outcome of the outstanding fetch. Failures leave the
    /// page, cursor and history exactly as they were.
    pub fn apply(&mut self, result: FetchResult) -> Result<(), NavigationError> {
        let step = self.pending.take();
        let (fetched_address, content) = match result {
            FetchResult::Error { message } => {
                if let Some(step) = step {
                    self.restore(step);
                }
                return Err(NavigationError::Network(message));
            }
            FetchResult::Menu { address, lines } => match entry::parse_listing(&lines) {
                Ok(entries) => (address, Content::Menu(entries)),
                Err(err) => {
                    if let Some(step) = step {
                        self.restore(step);
                    }
                    return Err(err.into());
                }
            },
            FetchResult::Html { address, body } => (address, Content::Html(split_body(&body))),
        };

        self.remember_current(step.as_ref());

        let (clean_address, line) = address::take_line(&fetched_address);
        self.current_address = clean_address;
        self.content = content;
        self.cursor = None;
        match line {
            Some(0) => {}
            Some(line) if self.content.is_selectable(line - 1) => self.cursor = Some(line - 1),
            _ => {
                if matches!(self.content, Content::Menu(_)) {
                    self.select_link(1);
                }
            }
        }
        Ok(())
    }

    fn begin(&mut self, step: Step) {
        if let Some(previous) = self.pending.replace(step) {
            self.restore(previous);
        }
    }

    fn restore(&mut self, step: Step) {
        match step {
            Step::Back(address) => self.history_before.push_front(address),
            Step::Forward(address) => self.history_after.push_front(address),
            Step::Open | Step::Reload => {}
        }
    }

    fn remember_current(&mut self, step: Option<&Step>) {
        if matches!(self.content, Content::Empty) || matches!(step, Some(Step::Reload)) {
            return;
        }
        let saved = address::with_line(&self.current_address, self.saved_line());
        if matches!(step, Some(Step::Back(_))) {
            self.history_after.push_front(saved);
        } else {
            self.history_before.push_front(saved);
        }
    }

    fn saved_line(&self) -> usize {
        self.cursor.map_or(0, |cursor| cursor + 1)
    }
}

fn split_body(body: &str) -> Vec<String> {
    body.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ROOT: &str = "gopher://h/";
    const PAGE_A: &str = "gopher://h:70/?q=/a&t=1";
    const PAGE_B: &str = "gopher://h:70/?q=/b&t=1";
    const PAGE_DOC: &str = "gopher://h:70/?q=/doc.html&t=h";

    struct Site {
        pages: HashMap<&'static str, Vec<&'static str>>,
    }

    impl Site {
        fn new() -> Self {
            let mut pages = HashMap::new();
            pages.insert(
                ROOT,
                vec![
                    "iWelcome",
                    "0Readme\t/readme\th\t70",
                    "1Section A\t/a\th\t70",
                    "1Section B\t/b\th\t70",
                    "hDocument\t/doc.html\th\t70",
                ],
            );
            pages.insert(
                PAGE_A,
                vec!["iSection A", "1Section B\t/b\th\t70", "0About\t/about\th\t70"],
            );
            pages.insert(PAGE_B, vec!["iNothing to follow here", "0Notes\t/n\th\t70"]);
            Self { pages }
        }

        fn fetch(&self, requested: &str) -> FetchResult {
            let (clean, _) = address::take_line(requested);
            if clean == PAGE_DOC {
                return FetchResult::Html {
                    address: requested.to_string(),
                    body: "<p>one</p>\r\n<p>two</p>".to_string(),
                };
            }
            match self.pages.get(clean.as_str()) {
                Some(lines) => FetchResult::Menu {
                    address: requested.to_string(),
                    lines: lines.iter().map(|line| line.to_string()).collect(),
                },
                None => FetchResult::error(format!("cannot connect to `{clean}`")),
            }
        }
    }

    fn loaded(site: &Site) -> Navigation {
        let mut nav = Navigation::new(ROOT);
        let address = nav.open(ROOT);
        nav.apply(site.fetch(&address)).unwrap();
        nav
    }

    fn snapshot(nav: &Navigation) -> (String, Option<usize>) {
        (nav.current_address().to_string(), nav.cursor())
    }

    #[test]
    fn first_load_selects_first_link_and_keeps_history_empty() {
        let site = Site::new();
        let nav = loaded(&site);
        assert_eq!(nav.current_address(), ROOT);
        assert_eq!(nav.cursor(), Some(2));
        assert!(nav.history_before().is_empty());
        assert!(nav.history_after().is_empty());
    }

    #[test]
    fn select_link_skips_non_links_without_wrapping() {
        let mut nav = Navigation::new(ROOT);
        nav.apply(FetchResult::Menu {
            address: ROOT.into(),
            lines: vec!["0file".into(), "1menu".into(), "1menu".into()],
        })
        .unwrap();
        nav.cursor = None;

        assert!(nav.select_link(1));
        assert_eq!(nav.cursor(), Some(1));
        assert!(nav.select_link(1));
        assert_eq!(nav.cursor(), Some(2));
        assert!(!nav.select_link(1));
        assert_eq!(nav.cursor(), Some(2));

        assert!(nav.select_link(-1));
        assert_eq!(nav.cursor(), Some(1));
        assert!(!nav.select_link(-1));
        assert_eq!(nav.cursor(), Some(1));
    }

    #[test]
    fn select_up_from_nothing_selects_nothing() {
        let mut nav = Navigation::new(ROOT);
        nav.apply(FetchResult::Menu {
            address: ROOT.into(),
            lines: vec!["iinfo".into()],
        })
        .unwrap();
        assert_eq!(nav.cursor(), None);
        assert!(!nav.select_link(-1));
        assert!(!nav.select_link(1));
        assert_eq!(nav.cursor(), None);
    }

    #[test]
    fn following_pushes_current_page_with_cursor() {
        let site = Site::new();
        let mut nav = loaded(&site);
        nav.select_link(1);
        let next = nav.follow_selection().unwrap();
        assert_eq!(next, PAGE_B);
        nav.apply(site.fetch(&next)).unwrap();

        assert_eq!(nav.current_address(), PAGE_B);
        assert_eq!(nav.cursor(), None);
        assert_eq!(nav.history_before().front().map(String::as_str), Some("gopher://h/?l=4"));
    }

    #[test]
    fn back_then_forward_restores_address_and_cursor() {
        let site = Site::new();
        let mut nav = loaded(&site);

        // root -> A -> B, then back to A
        let next = nav.follow_selection().unwrap();
        nav.apply(site.fetch(&next)).unwrap();
        assert_eq!(nav.current_address(), PAGE_A);
        let next = nav.follow_selection().unwrap();
        nav.apply(site.fetch(&next)).unwrap();
        assert_eq!(nav.current_address(), PAGE_B);
        let previous = nav.go_back().unwrap();
        nav.apply(site.fetch(&previous)).unwrap();

        let before_back = snapshot(&nav);
        assert_eq!(before_back, (PAGE_A.to_string(), Some(1)));

        let previous = nav.go_back().unwrap();
        nav.apply(site.fetch(&previous)).unwrap();
        assert_eq!(snapshot(&nav), (ROOT.to_string(), Some(2)));

        let next = nav.go_forward().unwrap();
        nav.apply(site.fetch(&next)).unwrap();
        assert_eq!(snapshot(&nav), before_back);
    }

    #[test]
    fn back_and_forward_never_share_a_step() {
        let site = Site::new();
        let mut nav = loaded(&site);
        let next = nav.follow_selection().unwrap();
        nav.apply(site.fetch(&next)).unwrap();

        let previous = nav.go_back().unwrap();
        nav.apply(site.fetch(&previous)).unwrap();
        assert!(nav.history_before().is_empty());
        assert_eq!(nav.history_after().len(), 1);

        let next = nav.go_forward().unwrap();
        nav.apply(site.fetch(&next)).unwrap();
        assert_eq!(nav.history_before().len(), 1);
        assert!(nav.history_after().is_empty());
    }

    #[test]
    fn empty_history_reports_errors() {
        let site = Site::new();
        let mut nav = loaded(&site);
        assert_eq!(nav.go_back(), Err(NavigationError::NoPrevious));
        assert_eq!(nav.go_forward(), Err(NavigationError::NoNext));
        assert!(NavigationError::NoPrevious
            .to_string()
            .contains("no previous page"));
        assert!(!nav.is_pending());
    }

    #[test]
    fn failed_fetch_is_invisible() {
        let site = Site::new();
        let mut nav = loaded(&site);
        let next = nav.follow_selection().unwrap();
        nav.apply(site.fetch(&next)).unwrap();
        let before = (snapshot(&nav), nav.history_before().clone());

        let target = nav.open("gopher://elsewhere/");
        let err = nav.apply(site.fetch(&target)).unwrap_err();
        assert!(matches!(err, NavigationError::Network(_)));
        assert_eq!((snapshot(&nav), nav.history_before().clone()), before);

        let previous = nav.go_back().unwrap();
        let err = nav.apply(FetchResult::error("cannot connect")).unwrap_err();
        assert_eq!(err.to_string(), "Network error: cannot connect");
        assert_eq!(nav.history_before().front(), Some(&previous));
        assert!(nav.history_after().is_empty());
        assert_eq!(snapshot(&nav), before.0);
    }

    #[test]
    fn bad_listing_keeps_previous_page() {
        let site = Site::new();
        let mut nav = loaded(&site);
        let before = snapshot(&nav);

        let target = nav.open(PAGE_A);
        let err = nav
            .apply(FetchResult::Menu {
                address: target,
                lines: vec!["iok".into(), String::new()],
            })
            .unwrap_err();
        assert!(matches!(err, NavigationError::Parse(_)));
        assert_eq!(snapshot(&nav), before);
        assert!(nav.history_before().is_empty());
        assert!(matches!(nav.content(), Content::Menu(entries) if entries.len() == 5));
    }

    #[test]
    fn follow_errors() {
        let site = Site::new();
        let mut nav = loaded(&site);

        nav.cursor = Some(1);
        assert_eq!(nav.follow_selection(), Err(NavigationError::NotFollowable));
        nav.cursor = None;
        assert_eq!(
            nav.follow_selection(),
            Err(NavigationError::NothingSelectable)
        );

        nav.apply(FetchResult::Menu {
            address: ROOT.into(),
            lines: vec!["1No address".into()],
        })
        .unwrap();
        assert_eq!(nav.cursor(), Some(0));
        assert_eq!(nav.follow_selection(), Err(NavigationError::MissingAddress));
    }

    #[test]
    fn html_pages_select_any_line() {
        let site = Site::new();
        let mut nav = loaded(&site);
        nav.select_link(1);
        nav.select_link(1);
        let next = nav.follow_selection().unwrap();
        assert_eq!(next, PAGE_DOC);
        nav.apply(site.fetch(&next)).unwrap();

        assert_eq!(
            nav.content(),
            &Content::Html(vec!["<p>one</p>".into(), "<p>two</p>".into()])
        );
        assert_eq!(nav.cursor(), None);
        assert!(nav.select_link(1));
        assert_eq!(nav.cursor(), Some(0));
        assert!(nav.select_link(1));
        assert!(!nav.select_link(1));
        assert_eq!(nav.cursor(), Some(1));
        assert_eq!(nav.follow_selection(), Err(NavigationError::NotFollowable));
    }

    #[test]
    fn reload_keeps_cursor_and_history() {
        let site = Site::new();
        let mut nav = loaded(&site);
        nav.select_link(1);

        let address = nav.reload();
        assert_eq!(address, "gopher://h/?l=4");
        nav.apply(site.fetch(&address)).unwrap();
        assert_eq!(snapshot(&nav), (ROOT.to_string(), Some(3)));
        assert!(nav.history_before().is_empty());
    }

    #[test]
    fn stale_cursor_falls_back_to_first_link() {
        let mut nav = Navigation::new(ROOT);
        nav.apply(FetchResult::Menu {
            address: "gopher://h/?l=9".into(),
            lines: vec!["iinfo".into(), "1menu".into()],
        })
        .unwrap();
        assert_eq!(nav.current_address(), ROOT);
        assert_eq!(nav.cursor(), Some(1));
    }

    #[test]
    fn abandon_gives_history_back() {
        let site = Site::new();
        let mut nav = loaded(&site);
        let next = nav.follow_selection().unwrap();
        nav.apply(site.fetch(&next)).unwrap();

        nav.go_back().unwrap();
        assert!(nav.history_before().is_empty());
        nav.abandon();
        assert_eq!(nav.history_before().len(), 1);
        assert!(!nav.is_pending());
    }
}
