//! In-memory stand-in for the county portal.
//!
//! Every screen is rendered as a tree of frames whose names, URLs and
//! selectors follow the default `SiteProfile`. Clickable elements carry a
//! `data-act` attribute naming the transition they trigger.

#![allow(dead_code)]

use async_trait::async_trait;
use probate_scraper::{Error, FrameHandle, PageDriver, Result, Target};
use scraper::{ElementRef, Html, Selector};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

const BASE: &str = "https://fake.test/countyweb/";
const SCAN: &str = "a, img, input, button, span, [onclick]";

/// One case of the fake result list.
#[derive(Debug, Clone)]
pub struct FakeCase {
    pub case_file_id: String,
    pub case_file_num: String,
    pub filing_date: String,
    pub date_of_death: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    /// Rows of the representatives table, names and address lines mixed.
    pub rep_rows: Vec<String>,
}

impl FakeCase {
    pub fn new(id: u32, filing_date: &str) -> Self {
        Self {
            case_file_id: format!("{}", 90000 + id),
            case_file_num: format!("2025-{:04}", id),
            filing_date: filing_date.into(),
            date_of_death: String::new(),
            street: format!("{} Main St", id),
            city: "Media".into(),
            state: "PA".into(),
            zip: "19063".into(),
            rep_rows: Vec::new(),
        }
    }

    pub fn rep(mut self, name: &str, address_lines: &[&str]) -> Self {
        self.rep_rows.push(name.into());
        self.rep_rows.extend(address_lines.iter().map(|l| l.to_string()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Decedent,
    Representatives,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Blank,
    Login,
    Terms,
    Menu,
    Criteria,
    NoResults,
    Results { page: usize },
    Detail { page: usize, row: usize, tab: Tab },
}

#[derive(Debug, Default)]
pub struct Options {
    /// `frames()` calls answered with an empty tree after each transition.
    pub settle_polls: u32,
    /// (page, row) links that open nothing.
    pub broken_rows: HashSet<(usize, usize)>,
    /// (page, row) detail views without a way back.
    pub no_back: HashSet<(usize, usize)>,
    /// The search form has no submit control.
    pub no_submit: bool,
    /// The terms frame has no accept control.
    pub no_accept: bool,
    /// Name of a pager function that jumps to a 1-based page, read from
    /// `#pageNumber`.
    pub jump_function: Option<String>,
}

#[derive(Debug)]
struct State {
    screen: Screen,
    url: String,
    pending_settle: u32,
    typed: BTreeMap<String, String>,
    frame_polls: usize,
    actions: Vec<String>,
}

/// A scripted portal. `pages[p][r]` is row `r` of result page `p`.
pub struct FakeSite {
    pages: Vec<Vec<FakeCase>>,
    opts: Options,
    state: RefCell<State>,
}

struct FakeFrame {
    handle: FrameHandle,
    html: String,
}

fn frame(name: &str, url: &str, path: &[usize], html: String) -> FakeFrame {
    FakeFrame {
        handle: FrameHandle {
            name: name.into(),
            url: format!("{}{}", BASE, url),
            loaded: true,
            path: path.to_vec(),
        },
        html: format!("<html><body>{}</body></html>", html),
    }
}

fn norm(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn element_text(el: ElementRef<'_>) -> String {
    norm(&el.text().collect::<String>())
}

fn find<'h>(doc: &'h Html, target: &Target) -> Option<ElementRef<'h>> {
    let select = |css: &str| Selector::parse(css).ok();
    match target {
        Target::Css(css) => doc.select(&select(css)?).next(),
        Target::Nth { css, index } => doc.select(&select(css)?).nth(*index),
        Target::Text { css, text } => {
            let want = norm(text);
            doc.select(&select(css)?)
                .find(|el| element_text(*el).contains(&want))
        }
        Target::Scan(needles) => {
            let needles: Vec<String> = needles.iter().map(|n| norm(n)).collect();
            doc.select(&select(SCAN)?).find(|el| {
                let attrs = ["alt", "value", "title", "onclick"]
                    .iter()
                    .filter_map(|a| el.value().attr(a))
                    .map(norm)
                    .collect::<Vec<_>>()
                    .join(" ");
                let hay = format!("{} {}", element_text(*el), attrs);
                needles.iter().any(|n| !n.is_empty() && hay.contains(n.as_str()))
            })
        }
    }
}

fn action_of(el: ElementRef<'_>) -> Option<String> {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .find_map(|e| e.value().attr("data-act"))
        .map(str::to_string)
}

impl FakeSite {
    pub fn new(pages: Vec<Vec<FakeCase>>) -> Self {
        Self::with_options(pages, Options::default())
    }

    pub fn with_options(pages: Vec<Vec<FakeCase>>, opts: Options) -> Self {
        Self {
            pages,
            opts,
            state: RefCell::new(State {
                screen: Screen::Blank,
                url: "about:blank".into(),
                pending_settle: 0,
                typed: BTreeMap::new(),
                frame_polls: 0,
                actions: Vec::new(),
            }),
        }
    }

    pub fn screen(&self) -> Screen {
        self.state.borrow().screen
    }

    /// Value typed into the input matching `css`.
    pub fn typed(&self, css: &str) -> Option<String> {
        self.state.borrow().typed.get(css).cloned()
    }

    /// Transitions taken so far, in order.
    pub fn actions(&self) -> Vec<String> {
        self.state.borrow().actions.clone()
    }

    pub fn frame_polls(&self) -> usize {
        self.state.borrow().frame_polls
    }

    /// Jump straight to `screen`, as if the site had navigated there.
    pub fn show(&self, screen: Screen) {
        let mut state = self.state.borrow_mut();
        state.screen = screen;
        state.pending_settle = self.opts.settle_polls;
    }

    fn case(&self, page: usize, row: usize) -> Option<&FakeCase> {
        self.pages.get(page).and_then(|rows| rows.get(row))
    }

    fn top_html(&self, screen: Screen) -> String {
        match screen {
            Screen::Login => r#"<html><body>
<input type="button" value=" Login as Guest " data-act="guest">
</body></html>"#
                .into(),
            _ => "<html><body><div id=\"frames\"></div></body></html>".into(),
        }
    }

    fn render(&self, screen: Screen) -> Vec<FakeFrame> {
        match screen {
            Screen::Blank | Screen::Login => Vec::new(),
            Screen::Terms => {
                let accept = if self.opts.no_accept {
                    String::new()
                } else {
                    r#"<button id="accept" data-act="accept">I Accept</button>"#.into()
                };
                vec![frame(
                    "bodyframe",
                    "disclaimer.jsp",
                    &[0],
                    format!("<p>Terms of use</p>{}", accept),
                )]
            }
            Screen::Menu => vec![frame(
                "bodyframe",
                "main.jsp?countyname=DelawarePA&menu=1",
                &[0],
                r#"<table><tr id="datagrid-row-r1-2-0" data-act="search">
<td>Search Public Records</td></tr></table>"#
                    .into(),
            )],
            Screen::Criteria => {
                let submit = if self.opts.no_submit {
                    String::new()
                } else {
                    r##"<a href="#" onclick="executeSearchCommand('search')" data-act="submit">Search</a>"##
                        .into()
                };
                vec![
                    frame("bodyframe", "searchMain.jsp", &[0], String::new()),
                    frame("dynSearchFrame", "dynSearch.do", &[0, 0], submit),
                    frame(
                        "criteriaframe",
                        "dynCriteria.do?searchType=casefile",
                        &[0, 0, 0],
                        r#"<div id="elemDateRange">
<input id="_easyui_textbox_input7" type="text">
<input id="_easyui_textbox_input8" type="text">
</div>"#
                            .into(),
                    ),
                ]
            }
            Screen::NoResults => vec![
                frame("bodyframe", "searchMain.jsp", &[0], String::new()),
                frame(
                    "resultFrame",
                    "SearchResultsView.jsp",
                    &[0, 0],
                    "<p>No records found</p>".into(),
                ),
            ],
            Screen::Results { page } => self.render_results(page),
            Screen::Detail { page, row, tab } => self.render_detail(page, row, tab),
        }
    }

    fn render_results(&self, page: usize) -> Vec<FakeFrame> {
        let rows: String = self
            .pages
            .get(page)
            .map(|cases| {
                cases
                    .iter()
                    .enumerate()
                    .map(|(i, case)| {
                        format!(
                            r##"<tr><td><a class="link" id="inst{i}" href="#" onclick="loadRecord({i})" data-act="row:{i}">{}</a></td><td>{}</td></tr>"##,
                            case.case_file_num, case.filing_date
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        let mut next = if page + 1 < self.pages.len() {
            r##"<a href="#" onclick="navigateResults('next')" data-act="next">Next</a>"##.to_string()
        } else {
            String::new()
        };
        if self.opts.jump_function.is_some() {
            next.push_str(r#"<input id="pageNumber" type="text">"#);
        }

        vec![
            frame("bodyframe", "searchMain.jsp", &[0], String::new()),
            frame("resultFrame", "SearchResultsView.jsp", &[0, 0], String::new()),
            frame(
                "resultListFrame",
                &format!("casefile_SearchResultList.jsp?page={}", page + 1),
                &[0, 0, 0],
                format!("<table>{}</table>", rows),
            ),
            frame(
                "",
                "navbar.do?page=search.resultNav&subnav=1",
                &[0, 0, 1],
                next,
            ),
        ]
    }

    fn render_detail(&self, page: usize, row: usize, tab: Tab) -> Vec<FakeFrame> {
        let Some(case) = self.case(page, row) else {
            return Vec::new();
        };
        let doc_info = match tab {
            Tab::Decedent => format!(
                r#"<table>
<tr><td><span id="fieldFILING_DATEspan">Filing Date:</span></td><td></td><td>{}</td></tr>
<tr><td><span id="fieldCASE_FILE_NUMspan">Case File No.:</span></td><td></td><td>{}</td></tr>
<tr><td><span id="fieldDATE_OF_DEATHspan">Date of Death:</span></td><td></td><td>{}</td></tr>
<tr><td><span id="fcaddrCORESPONDENT_ADDRESSspan">Address</span></td><td></td><td>{}</td></tr>
<tr><td><span id="fccityCORESPONDENT_ADDRESSspan">City</span></td><td></td><td>{}</td></tr>
<tr><td><span id="fcstateCORESPONDENT_ADDRESSspan">State</span></td><td></td>
<td><table class="base"><tr><td>{}</td><td>Zip</td><td>{}</td></tr></table></td></tr>
</table>"#,
                case.filing_date,
                case.case_file_num,
                case.date_of_death,
                case.street,
                case.city,
                case.state,
                case.zip
            ),
            Tab::Representatives => {
                let rows: String = case
                    .rep_rows
                    .iter()
                    .enumerate()
                    .map(|(i, text)| {
                        let class = if i % 2 == 0 { "evenrow" } else { "oddrow" };
                        format!(r#"<tr class="{class}"><td>{}</td><td>{text}</td></tr>"#, i + 1)
                    })
                    .collect();
                format!("<table><tr><th>#</th><th>Name / Address</th></tr>{}</table>", rows)
            }
        };
        let back = if self.opts.no_back.contains(&(page, row)) {
            String::new()
        } else {
            r##"<a href="#" onclick="executeSearchNav('results')" data-act="back">Back to Results</a>"##
                .into()
        };

        vec![
            frame("bodyframe", "searchMain.jsp", &[0], String::new()),
            frame(
                "documentFrame",
                &format!(
                    "DocumentInfoView.jsp?caseFileId={}&caseFileNum={}",
                    case.case_file_id, case.case_file_num
                ),
                &[0, 0],
                String::new(),
            ),
            frame(
                "tabs",
                "tabbar.do",
                &[0, 0, 0],
                r#"<ul class="tabs">
<li data-act="tab:decedent"><span class="tabs-title">Decedent &amp; Estate Info</span></li>
<li data-act="tab:representatives"><span class="tabs-title">Representatives</span></li>
</ul>"#
                    .into(),
            ),
            frame(
                "docInfoFrame",
                &format!("transAddDocCaseFile.do?tab={:?}", tab),
                &[0, 0, 1],
                doc_info,
            ),
            frame(
                "resnavframe",
                "navbar.do?page=search.details",
                &[1],
                back,
            ),
        ]
    }

    /// The live frame `handle` names, or `FrameDetached`.
    fn live(&self, handle: &FrameHandle) -> Result<String> {
        let screen = self.screen();
        if handle.is_top() {
            return Ok(self.top_html(screen));
        }
        self.render(screen)
            .into_iter()
            .find(|f| f.handle.path == handle.path)
            .filter(|f| handle.url.is_empty() || f.handle.url == handle.url)
            .map(|f| f.html)
            .ok_or_else(|| Error::FrameDetached(handle.to_string()))
    }

    fn act(&self, action: &str) {
        let screen = self.screen();
        let next = match (action.split_once(':'), screen) {
            (None, _) if action == "guest" => {
                self.state.borrow_mut().url = format!("{}main.jsp?countyname=DelawarePA", BASE);
                Some(Screen::Terms)
            }
            (None, _) if action == "accept" => Some(Screen::Menu),
            (None, _) if action == "search" => Some(Screen::Criteria),
            (None, _) if action == "submit" => {
                let has_rows = self.pages.first().is_some_and(|p| !p.is_empty());
                Some(if has_rows {
                    Screen::Results { page: 0 }
                } else {
                    Screen::NoResults
                })
            }
            (None, Screen::Results { page }) if action == "next" => {
                Some(Screen::Results { page: page + 1 })
            }
            (None, Screen::Detail { page, .. }) if action == "back" => {
                Some(Screen::Results { page })
            }
            (Some(("row", row)), Screen::Results { page }) => {
                let row: usize = row.parse().unwrap_or(usize::MAX);
                if self.opts.broken_rows.contains(&(page, row)) {
                    None
                } else {
                    Some(Screen::Detail {
                        page,
                        row,
                        tab: Tab::Decedent,
                    })
                }
            }
            (Some(("tab", tab)), Screen::Detail { page, row, .. }) => Some(Screen::Detail {
                page,
                row,
                tab: if tab == "representatives" {
                    Tab::Representatives
                } else {
                    Tab::Decedent
                },
            }),
            _ => None,
        };

        self.state.borrow_mut().actions.push(action.to_string());
        if let Some(next) = next {
            self.show(next);
        }
    }
}

#[async_trait(?Send)]
impl PageDriver for FakeSite {
    async fn goto(&self, url: &str) -> Result<()> {
        self.state.borrow_mut().url = url.to_string();
        self.show(Screen::Login);
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.state.borrow().url.clone())
    }

    async fn page_html(&self) -> Result<String> {
        Ok(self.top_html(self.screen()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn frames(&self) -> Result<Vec<FrameHandle>> {
        let mut state = self.state.borrow_mut();
        state.frame_polls += 1;
        if state.pending_settle > 0 {
            state.pending_settle -= 1;
            return Ok(Vec::new());
        }
        let screen = state.screen;
        drop(state);
        Ok(self.render(screen).into_iter().map(|f| f.handle).collect())
    }

    async fn frame_html(&self, frame: &FrameHandle) -> Result<String> {
        self.live(frame)
    }

    async fn count(&self, frame: &FrameHandle, css: &str) -> Result<usize> {
        let html = self.live(frame)?;
        let Ok(sel) = Selector::parse(css) else {
            return Ok(0);
        };
        Ok(Html::parse_document(&html).select(&sel).count())
    }

    async fn exists(&self, frame: &FrameHandle, target: &Target) -> Result<bool> {
        let html = self.live(frame)?;
        Ok(find(&Html::parse_document(&html), target).is_some())
    }

    async fn click(&self, frame: &FrameHandle, target: &Target) -> Result<bool> {
        let html = self.live(frame)?;
        let doc = Html::parse_document(&html);
        let Some(el) = find(&doc, target) else {
            return Ok(false);
        };
        if let Some(action) = action_of(el) {
            self.act(&action);
        }
        Ok(true)
    }

    async fn fill(&self, frame: &FrameHandle, css: &str, value: &str) -> Result<bool> {
        let html = self.live(frame)?;
        if find(&Html::parse_document(&html), &Target::css(css)).is_none() {
            return Ok(false);
        }
        self.state
            .borrow_mut()
            .typed
            .insert(css.to_string(), value.to_string());
        Ok(true)
    }

    async fn invoke(
        &self,
        frame: &FrameHandle,
        function: &str,
        args: &[serde_json::Value],
    ) -> Result<bool> {
        self.live(frame)?;
        if self.opts.jump_function.as_deref() != Some(function) {
            return Ok(false);
        }
        let target = args.first().and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        self.state
            .borrow_mut()
            .actions
            .push(format!("{}({})", function, target));
        if let Screen::Results { .. } = self.screen() {
            if (1..=self.pages.len()).contains(&target) {
                self.show(Screen::Results { page: target - 1 });
            }
        }
        Ok(true)
    }

    async fn text_of(&self, frame: &FrameHandle, target: &Target) -> Result<Option<String>> {
        let html = self.live(frame)?;
        let doc = Html::parse_document(&html);
        Ok(find(&doc, target).map(|el| {
            el.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        }))
    }
}

/// A config with the default site profile and a short search range.
pub fn config() -> probate_scraper::Config {
    probate_scraper::Config::parse(
        r#"
name: "Fake County"
search:
  from: "01/01/2025"
  to: "01/31/2025"
output:
  dir: "unused"
  debug_dir: null
"#,
    )
    .unwrap()
}

pub fn session<'a>(
    site: &'a FakeSite,
    config: &'a probate_scraper::Config,
    debug: &'a probate_scraper::DebugSink,
) -> probate_scraper::Session<'a> {
    probate_scraper::Session::new(site, &config.site, &config.timing, debug)
}
