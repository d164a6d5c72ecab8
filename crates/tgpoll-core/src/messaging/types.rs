use serde::Serialize;

/// Reply keyboard: rows of button labels, shown in the order given.
///
/// Built once and shared by reference; never changed after construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KeyboardMarkup {
    keyboard: Vec<Vec<String>>,
    #[serde(rename = "resize_keyboard", skip_serializing_if = "is_false")]
    resize: bool,
    #[serde(rename = "one_time_keyboard", skip_serializing_if = "is_false")]
    one_time: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl KeyboardMarkup {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            keyboard: rows,
            resize: false,
            one_time: false,
        }
    }

    /// Ask the client to shrink the keyboard to fit its buttons.
    pub fn resized(mut self) -> Self {
        self.resize = true;
        self
    }

    /// Hide the keyboard after one button press.
    pub fn one_time(mut self) -> Self {
        self.one_time = true;
        self
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.keyboard
    }

    /// Parse `"a,b;c"` into `[["a","b"],["c"]]`. Blank labels and empty rows
    /// are dropped; returns `None` when nothing is left.
    pub fn parse_layout(spec: &str) -> Option<Self> {
        let rows: Vec<Vec<String>> = spec
            .split(';')
            .map(|row| {
                row.split(',')
                    .map(str::trim)
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|row| !row.is_empty())
            .collect();

        if rows.is_empty() {
            None
        } else {
            Some(Self::new(rows))
        }
    }
}

/// What a handler wants sent back to the chat the message came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub markup: Option<KeyboardMarkup>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    pub fn with_markup(mut self, markup: KeyboardMarkup) -> Self {
        self.markup = Some(markup);
        self
    }
}
