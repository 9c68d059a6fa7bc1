//! Vendor constants of the record portal.
//!
//! Defaults match the Delaware County, PA deployment. Every value can be
//! overridden per section in the YAML config.

use crate::driver::Target;
use crate::frames::FrameLocatorPath;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Guest login page.
    pub entry_url: String,
    /// Regex the top URL matches once the guest session is open.
    pub post_login_url: String,
    /// Guest login controls on the top page, tried in order.
    pub guest_login: Vec<Target>,

    /// Frames that may hold the terms dialog, tried in order.
    pub terms_frames: Vec<FrameLocatorPath>,
    pub accept_selector: String,

    pub body_frame: FrameLocatorPath,
    /// "Search Public Records" row of the body frame menu.
    pub search_row_selector: String,

    pub criteria_frame: FrameLocatorPath,
    pub criteria_fallback_frame: FrameLocatorPath,
    pub date_container_selector: String,
    pub from_input_selector: String,
    pub to_input_selector: String,

    pub search_frame: FrameLocatorPath,
    pub submit_selector: String,

    pub results_list_frame: FrameLocatorPath,
    pub results_list_fallback_frame: FrameLocatorPath,
    /// URL fragment present while the result view is shown.
    pub results_fragment: String,
    /// Matches every row link of the result list.
    pub row_link_selector: String,
    /// Row link by index; `{index}` is replaced with the 0-based row.
    pub row_link_by_index: String,
    /// Row links when the indexed form is missing.
    pub row_link_fallback: String,

    pub detail_frame: FrameLocatorPath,
    pub detail_fallback_frame: FrameLocatorPath,
    /// URL fragment of the detail frame carrying the case ids.
    pub detail_fragment: String,
    pub case_id_param: String,
    pub case_num_param: String,
    pub doc_info_frame: FrameLocatorPath,
    pub doc_info_fallback_frame: FrameLocatorPath,
    pub tabs_frame: FrameLocatorPath,
    pub tabs_fallback_frame: FrameLocatorPath,
    pub tab_list_selector: String,
    pub tab_title_selector: String,
    pub tab_item_selector: String,
    pub decedent_tab: Vec<String>,
    pub representatives_tab: Vec<String>,
    pub decedent: DecedentFields,
    pub representatives: RepresentativeRules,

    /// Frames holding the "Back to Results" control, tried in order.
    pub back_frames: Vec<FrameLocatorPath>,
    pub back_to_results: Vec<Target>,

    /// Frames holding the result pager, tried in order.
    pub pager_frames: Vec<FrameLocatorPath>,
    pub next_page: Vec<Target>,
    /// Direct page jump, preferred over "Next" when set.
    pub page_jump: Option<PageJump>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        let body = || FrameLocatorPath::new().name("bodyframe");
        let detail = || body().name("documentFrame");
        let results = || body().name("resultFrame");

        Self {
            entry_url: "https://delcorowonlineservices.co.delaware.pa.us/countyweb/loginDisplay.action?countyname=DelawarePA".into(),
            post_login_url: r"main\.jsp\?countyname=DelawarePA".into(),
            guest_login: vec![
                Target::Css("input[value=' Login as Guest ']".into()),
                Target::Css("input[value='Login as Guest']".into()),
                Target::Css("input[type='button'][value*='Guest']".into()),
                Target::Scan(vec!["Login as Guest".into()]),
            ],

            terms_frames: vec![body(), FrameLocatorPath::new().url("blank.jsp")],
            accept_selector: "#accept".into(),

            body_frame: body(),
            search_row_selector: "#datagrid-row-r1-2-0".into(),

            criteria_frame: FrameLocatorPath::new().url("dynCriteria.do"),
            criteria_fallback_frame: FrameLocatorPath::new().url("blank.jsp"),
            date_container_selector: "#elemDateRange".into(),
            from_input_selector: "#_easyui_textbox_input7".into(),
            to_input_selector: "#_easyui_textbox_input8".into(),

            search_frame: body().name("dynSearchFrame"),
            submit_selector: "a[onclick*='executeSearchCommand'][onclick*='search']".into(),

            results_list_frame: results().name("resultListFrame"),
            results_list_fallback_frame: FrameLocatorPath::new()
                .url("casefile_SearchResultList.jsp"),
            results_fragment: "SearchResultsView.jsp".into(),
            row_link_selector: "a.link[id^='inst'], a.link[onclick*='loadRecord']".into(),
            row_link_by_index: "a.link#inst{index}".into(),
            row_link_fallback: "a.link[onclick*='loadRecord']".into(),

            detail_frame: detail(),
            detail_fallback_frame: FrameLocatorPath::new().url("DocumentInfoView.jsp"),
            detail_fragment: "DocumentInfoView.jsp".into(),
            case_id_param: "caseFileId".into(),
            case_num_param: "caseFileNum".into(),
            doc_info_frame: detail().name("docInfoFrame"),
            doc_info_fallback_frame: FrameLocatorPath::new().url("transAddDocCaseFile.do"),
            tabs_frame: detail().name("tabs"),
            tabs_fallback_frame: FrameLocatorPath::new().url("tabbar.do"),
            tab_list_selector: "ul.tabs".into(),
            tab_title_selector: "span.tabs-title".into(),
            tab_item_selector: "ul.tabs li".into(),
            decedent_tab: vec![
                "Decedent & Estate Info".into(),
                "Decedent/Estate Info".into(),
                "Decedent".into(),
            ],
            representatives_tab: vec![
                "Representatives".into(),
                "Personal Representatives".into(),
            ],
            decedent: DecedentFields::default(),
            representatives: RepresentativeRules::default(),

            back_frames: vec![
                FrameLocatorPath::new().name("resnavframe"),
                FrameLocatorPath::new().url("navbar.do?page=search.details"),
            ],
            back_to_results: vec![
                Target::Text {
                    css: "a, span, td".into(),
                    text: "Back to Results".into(),
                },
                Target::Css("a[onclick*='executeSearchNav'][onclick*='results']".into()),
                Target::Css("img[alt='Back to Results']".into()),
                Target::Scan(vec!["back to results".into(), "executeSearchNav".into()]),
            ],

            pager_frames: vec![
                results().url("subnav=1"),
                FrameLocatorPath::new().url("navbar.do?page=search.resultNav"),
            ],
            next_page: vec![
                Target::Text {
                    css: "a".into(),
                    text: "Next".into(),
                },
                Target::Css("a[onclick*='navigateResults'][onclick*='next']".into()),
                Target::Scan(vec!["next".into()]),
            ],
            page_jump: None,
        }
    }
}

impl SiteProfile {
    /// Selector of the row link at `index`.
    pub fn row_link(&self, index: usize) -> String {
        self.row_link_by_index
            .replace("{index}", &index.to_string())
    }
}

/// Locates one value of the decedent tab.
///
/// The value sits in the `cell`-th cell of the table row that holds
/// `anchor` (or, failing that, a cell whose text starts with `label`).
/// With `nested`, the value is the `nested`-th cell of the `table.base`
/// inside that row instead.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    pub anchor: Option<String>,
    pub label: Option<String>,
    #[serde(default = "FieldSpec::default_cell")]
    pub cell: usize,
    pub nested: Option<usize>,
}

impl FieldSpec {
    fn default_cell() -> usize {
        2
    }

    pub fn anchored(anchor: &str, cell: usize) -> Self {
        Self {
            anchor: Some(anchor.into()),
            label: None,
            cell,
            nested: None,
        }
    }

    pub fn labelled(mut self, label: &str) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn nested(mut self, index: usize) -> Self {
        self.nested = Some(index);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecedentFields {
    pub filing_date: FieldSpec,
    pub date_of_death: FieldSpec,
    pub case_file_number: FieldSpec,
    pub street: FieldSpec,
    pub city: FieldSpec,
    pub state: FieldSpec,
    pub zip: FieldSpec,
}

impl Default for DecedentFields {
    fn default() -> Self {
        Self {
            filing_date: FieldSpec::anchored("#fieldFILING_DATEspan", 2).labelled("Filing Date:"),
            date_of_death: FieldSpec::anchored("#fieldDATE_OF_DEATHspan", 2)
                .labelled("Date of Death:"),
            case_file_number: FieldSpec::anchored("#fieldCASE_FILE_NUMspan", 2)
                .labelled("Case File No.:"),
            street: FieldSpec::anchored("#fcaddrCORESPONDENT_ADDRESSspan", 2),
            city: FieldSpec::anchored("#fccityCORESPONDENT_ADDRESSspan", 2),
            state: FieldSpec::anchored("#fcstateCORESPONDENT_ADDRESSspan", 2).nested(0),
            zip: FieldSpec::anchored("#fcstateCORESPONDENT_ADDRESSspan", 2).nested(2),
        }
    }
}

/// How rows of the representatives tab are read and classified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepresentativeRules {
    /// Data rows of the representatives table.
    pub row_selector: String,
    /// Cell holding the row text.
    pub cell: usize,
    /// Digit-free rows shorter than this are names.
    pub name_max_len: usize,
    /// Substrings (upper case) that mark a non-name row as address.
    pub address_keywords: Vec<String>,
}

impl Default for RepresentativeRules {
    fn default() -> Self {
        Self {
            row_selector: "tr.evenrow, tr.oddrow".into(),
            cell: 1,
            name_max_len: 100,
            address_keywords: [
                "AVE", "ST", "STREET", "AVENUE", "ROAD", "RD", "LANE", "LN", "DR", "DRIVE",
                "APT", "SUITE",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}

/// Jump straight to a result page through an in-page function.
#[derive(Debug, Clone, Deserialize)]
pub struct PageJump {
    /// Page-number input of the pager frame.
    pub input: String,
    /// Global function called with the 1-based page number.
    pub function: String,
}
