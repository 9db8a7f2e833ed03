//! Fills form controls with configured or generated values and turns each
//! form into one or more submittable endpoints.

use crate::config::{GenerationConfig, INTELLIGENCE};
use crate::controls::{
    CheckboxControl, ControlDescriptor, ControlKind, FormDescriptor, InputControl, RadioGroup,
    SelectControl, TextareaControl, parse_numeric,
};
use crate::endpoint::{Endpoint, Method};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

/// Password characters, sliced by position so equal-length password fields
/// in one form always match.
pub const PASSWORD_CYCLE: [char; 12] = ['A', 'x', '1', '!', 'B', 'y', '2', '?', 'C', 'z', '3', '.'];

/// Longest password the cycle produces.
pub const PASSWORD_MAX: usize = PASSWORD_CYCLE.len() * 10;

/// Longest random string generated for a text-like control or textarea,
/// whatever the page declares.
pub const GENERATED_MAX: usize = 1024;

pub const TEL_VALUE: &str = "8882804331";
pub const URL_VALUE: &str = "http://www.example.com/";
pub const COLOR_VALUE: &str = "#2ec27e";

const DEFAULT_INPUT_MAXLENGTH: i64 = 10;
const DEFAULT_TEXTAREA_LENGTH: i64 = 50;
const DEFAULT_MIN: i64 = 0;
const DEFAULT_MAX: i64 = 100;

/// Non-leap month lengths used for the week number.
const MONTH_LENGTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

pub struct Synthesizer {
    config: Arc<GenerationConfig>,
    rng: StdRng,
    fixed_now: Option<NaiveDateTime>,
}

impl Synthesizer {
    pub fn new(config: Arc<GenerationConfig>) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
            fixed_now: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Pins the clock used for date-like inputs.
    pub fn with_fixed_time(mut self, now: NaiveDateTime) -> Self {
        self.fixed_now = Some(now);
        self
    }

    /// All configured submissions of `form`, one per round.
    pub fn submissions(&mut self, form: &FormDescriptor) -> Vec<Endpoint> {
        (0..self.config.submissions(form.method))
            .map(|round| self.submission(form, round))
            .collect()
    }

    /// A single submission. Round `r` gives the `k`-th control of each kind
    /// ordinal `r + k`.
    pub fn submission(&mut self, form: &FormDescriptor, round: usize) -> Endpoint {
        let mut per_kind: HashMap<ControlKind, usize> = HashMap::new();
        let mut params = String::new();

        for control in &form.controls {
            let position = per_kind.entry(control.kind()).or_insert(0);
            let ordinal = round + *position;
            *position += 1;
            params.push_str(&self.fragment(form.method, control, ordinal));
        }

        let params = params.strip_suffix('&').unwrap_or(&params);
        Endpoint::new(form.method, submission_url(&form.action, params))
    }

    /// `name=value&` for one control, or an empty string to omit it.
    pub fn fragment(
        &mut self,
        method: Method,
        control: &ControlDescriptor,
        ordinal: usize,
    ) -> String {
        let rule = self.config.rule(method, control.config_key());
        let configured = rule.pick(ordinal, &mut self.rng).to_string();

        let value = match control {
            ControlDescriptor::TextLike(input) => Some(self.input_value(input, &configured)),
            ControlDescriptor::Checkbox(checkbox) => self.checkbox_value(checkbox, &configured),
            ControlDescriptor::Radio(group) => self.radio_value(group, &configured),
            ControlDescriptor::Select(select) => self.select_value(select, &configured),
            ControlDescriptor::Textarea(textarea) => {
                Some(self.textarea_value(textarea, &configured))
            }
        };

        match value {
            Some(value) => pair(control.name(), &value),
            None => String::new(),
        }
    }

    pub fn input_value(&mut self, input: &InputControl, configured: &str) -> String {
        if configured != INTELLIGENCE {
            return configured.to_string();
        }

        let maxlength =
            numeric_attr("maxlength", input.maxlength.as_deref(), DEFAULT_INPUT_MAXLENGTH);
        let existing = input.value.clone().unwrap_or_default();
        let now = self.now();

        match input.input_type.as_deref() {
            Some("hidden") if existing.chars().count() > 1 => existing,
            Some("text") | Some("search") | Some("hidden") => match input.placeholder.as_deref() {
                Some(placeholder) if !placeholder.is_empty() => placeholder.to_string(),
                _ => self.alphanumeric(maxlength),
            },
            Some("password") => password(maxlength),
            Some("tel") => TEL_VALUE.to_string(),
            Some("url") => URL_VALUE.to_string(),
            Some("email") => format!("nobody{:04}@gmail.com", self.rng.gen_range(0..10_000)),
            Some("date") => now.format("%Y-%m-%d").to_string(),
            Some("datetime-local") => now.format("%Y-%m-%dT%H:%M").to_string(),
            Some("time") => now.format("%H:%M").to_string(),
            Some("month") => now.format("%Y-%m").to_string(),
            Some("week") => format!("{}-W{:02}", now.year(), week_of_year(now.date())),
            Some("number") | Some("range") => {
                let min = numeric_attr("min", input.min.as_deref(), DEFAULT_MIN);
                let max = numeric_attr("max", input.max.as_deref(), DEFAULT_MAX);
                max.checked_sub(min)
                    .map(|span| span / 2)
                    .unwrap_or((DEFAULT_MAX - DEFAULT_MIN) / 2)
                    .to_string()
            }
            Some("color") => COLOR_VALUE.to_string(),
            _ => existing,
        }
    }

    pub fn checkbox_value(&mut self, checkbox: &CheckboxControl, policy: &str) -> Option<String> {
        let checked = || checkbox.value.clone().unwrap_or_else(|| "on".to_string());
        match policy {
            "all" => Some(checked()),
            "random" if self.rng.gen_bool(0.5) => Some(checked()),
            _ => None,
        }
    }

    pub fn radio_value(&mut self, group: &RadioGroup, policy: &str) -> Option<String> {
        match policy {
            "first" => group.values.first().cloned(),
            "last" => group.values.last().cloned(),
            "random" => group.values.choose(&mut self.rng).cloned(),
            _ => None,
        }
    }

    pub fn select_value(&mut self, select: &SelectControl, policy: &str) -> Option<String> {
        let values: Vec<&str> = select.options.iter().map(|o| o.value.as_str()).collect();
        let chosen = match policy {
            "default" => match select.options.iter().find(|o| o.selected) {
                Some(option) => Some(option.value.as_str()),
                None => values.choose(&mut self.rng).copied(),
            },
            "first" => values.first().copied(),
            "last" => values.last().copied(),
            "random" => values.choose(&mut self.rng).copied(),
            _ => return None,
        };
        Some(chosen.unwrap_or_default().to_string())
    }

    pub fn textarea_value(&mut self, textarea: &TextareaControl, configured: &str) -> String {
        if configured != INTELLIGENCE {
            return configured.to_string();
        }
        let length = textarea_length(textarea);
        self.alphanumeric(length)
    }

    /// `maxlength - 1` random letters and digits, at most [`GENERATED_MAX`].
    fn alphanumeric(&mut self, maxlength: i64) -> String {
        let count = usize::try_from(maxlength.saturating_sub(1))
            .unwrap_or(0)
            .min(GENERATED_MAX);
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(count)
            .map(char::from)
            .collect()
    }

    fn now(&self) -> NaiveDateTime {
        self.fixed_now.unwrap_or_else(|| Local::now().naive_local())
    }
}

/// Deterministic password of `maxlength - 1` characters.
pub fn password(maxlength: i64) -> String {
    let capped = usize::try_from(maxlength).unwrap_or(0).min(PASSWORD_MAX);
    (0..capped.saturating_sub(1))
        .map(|i| PASSWORD_CYCLE[i % PASSWORD_CYCLE.len()])
        .collect()
}

/// Explicit maxlength, then half the visible area, then 50.
pub fn textarea_length(textarea: &TextareaControl) -> i64 {
    let maxlength = textarea
        .maxlength
        .as_deref()
        .map(|raw| parse_numeric("maxlength", raw))
        .transpose()
        .unwrap_or_else(|e| {
            debug!("{}", e);
            None
        })
        .unwrap_or(0);
    if maxlength != 0 {
        return maxlength;
    }

    match (textarea.rows.as_deref(), textarea.cols.as_deref()) {
        (Some(rows), Some(cols)) => {
            match (parse_numeric("rows", rows), parse_numeric("cols", cols)) {
                (Ok(rows), Ok(cols)) => rows
                    .checked_mul(cols)
                    .map(|area| area / 2)
                    .unwrap_or(DEFAULT_TEXTAREA_LENGTH),
                (Err(e), _) | (_, Err(e)) => {
                    debug!("{}", e);
                    DEFAULT_TEXTAREA_LENGTH
                }
            }
        }
        _ => DEFAULT_TEXTAREA_LENGTH,
    }
}

/// `ceil(day_of_year / 7)` over a non-leap calendar, so leap years drift by
/// a day after February.
pub fn week_of_year(date: NaiveDate) -> u32 {
    let days_before: u32 = MONTH_LENGTHS[..date.month0() as usize].iter().sum();
    (days_before + date.day()).div_ceil(7)
}

/// Appends `params` to `action`, adding `?` or `&` as needed.
pub fn submission_url(action: &str, params: &str) -> String {
    let mut url = action.to_string();
    if !url.contains('?') {
        url.push('?');
    } else if !url.ends_with('?') && !url.ends_with('&') {
        url.push('&');
    }
    url.push_str(params);
    url
}

fn pair(name: &str, value: &str) -> String {
    let name: String = form_urlencoded::byte_serialize(name.as_bytes()).collect();
    let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    format!("{}={}&", name, value)
}

fn numeric_attr(attribute: &'static str, raw: Option<&str>, default: i64) -> i64 {
    match raw.map(|raw| parse_numeric(attribute, raw)) {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            debug!("{}, using {}", e, default);
            default
        }
        None => default,
    }
}
