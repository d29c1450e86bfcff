//! Parser for the lightweight markup the formatter emits: `**bold**`,
//! `*italic*`, `♪` lyric lines, numbered section headers and speaker labels.
//! Pure functions only; `render::mod` turns the blocks into Word paragraphs.

const MUSIC_NOTE: char = '♪';
const TITLE_WINDOW: usize = 5;
const MAX_SPEAKER_LABEL_CHARS: usize = 40;
const MAX_SPEAKER_LABEL_WORDS: usize = 5;
const LONG_QUOTE_CHARS: usize = 50;

/// Bible books recognised as scripture even without a chapter:verse suffix.
const SCRIPTURE_BOOKS: &[&str] = &[
    "Genesis", "Exodus", "Leviticus", "Deuteronomy", "Joshua", "Judges", "Samuel", "Kings",
    "Chronicles", "Nehemiah", "Psalm", "Proverbs", "Ecclesiastes", "Isaiah", "Jeremiah",
    "Ezekiel", "Daniel", "Hosea", "Joel", "Micah", "Malachi", "Matthew", "Mark", "Luke", "John",
    "Acts", "Romans", "Corinthians", "Galatians", "Ephesians", "Philippians", "Colossians",
    "Thessalonians", "Timothy", "Titus", "Hebrews", "James", "Peter", "Jude", "Revelation",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Vertical spacing between sections.
    Blank,
    Divider,
    Title(String),
    SectionHeading(String),
    Lyric { text: String, notes_only: bool },
    Paragraph {
        speaker: Option<String>,
        spans: Vec<Span>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Emphasis {
    #[default]
    Plain,
    Bold,
    Italic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub emphasis: Emphasis,
}

impl Span {
    fn new(text: impl Into<String>, emphasis: Emphasis) -> Self {
        Self {
            text: text.into(),
            emphasis,
        }
    }

    pub fn is_scripture(&self) -> bool {
        self.emphasis == Emphasis::Bold && is_scripture_reference(&self.text)
    }

    pub fn is_long_quote(&self) -> bool {
        self.emphasis == Emphasis::Italic && self.text.chars().count() > LONG_QUOTE_CHARS
    }
}

/// A stretch of text attributed to one speaker (or to nobody).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Option<String>,
    pub text: String,
}

/// Splits formatted text into renderable blocks, one pass over the lines.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut has_title = false;

    for raw in text.lines() {
        let line = raw.trim();

        if line.is_empty() {
            if !blocks.is_empty() && blocks.last() != Some(&Block::Blank) {
                blocks.push(Block::Blank);
            }
            continue;
        }

        if is_divider(line) {
            blocks.push(Block::Divider);
            continue;
        }

        let in_title_window = !has_title && blocks.len() < TITLE_WINDOW;

        if let Some(heading) = markdown_heading(line) {
            if in_title_window && blocks.iter().all(|b| *b == Block::Blank) {
                has_title = true;
                blocks.push(Block::Title(heading));
            } else {
                blocks.push(Block::SectionHeading(heading));
            }
            continue;
        }

        if let Some(inner) = whole_bold(line) {
            if is_numbered_heading(inner) {
                blocks.push(Block::SectionHeading(inner.to_string()));
                continue;
            }
            if in_title_window && !inner.ends_with(':') {
                has_title = true;
                blocks.push(Block::Title(inner.to_string()));
                continue;
            }
        }

        if let Some(lyric) = lyric_line(line) {
            blocks.push(lyric);
            continue;
        }

        for turn in split_speaker_turns(line) {
            blocks.push(Block::Paragraph {
                speaker: turn.speaker,
                spans: parse_inline(&turn.text),
            });
        }
    }

    while blocks.last() == Some(&Block::Blank) {
        blocks.pop();
    }
    blocks
}

/// Parses `**bold**` and `*italic*` runs. Unpaired asterisks are dropped.
pub fn parse_inline(text: &str) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while let Some(star) = rest.find('*') {
        plain.push_str(&rest[..star]);
        let after = &rest[star..];

        let parsed = if let Some(inner) = after.strip_prefix("**") {
            inner
                .find("**")
                .filter(|&end| end > 0)
                .map(|end| (Emphasis::Bold, &inner[..end], &inner[end + 2..]))
        } else {
            let inner = &after[1..];
            find_single_star(inner)
                .filter(|&end| end > 0)
                .map(|end| (Emphasis::Italic, &inner[..end], &inner[end + 1..]))
        };

        match parsed {
            Some((emphasis, content, remainder)) => {
                flush_plain(&mut spans, &mut plain);
                let content = content.replace('*', "");
                if !content.is_empty() {
                    spans.push(Span::new(content, emphasis));
                }
                rest = remainder;
            }
            None => {
                // Stray marker: drop every asterisk in the run and keep going.
                rest = after.trim_start_matches('*');
            }
        }
    }

    plain.push_str(rest);
    flush_plain(&mut spans, &mut plain);
    spans
}

fn flush_plain(spans: &mut Vec<Span>, plain: &mut String) {
    if !plain.is_empty() {
        spans.push(Span::new(std::mem::take(plain), Emphasis::Plain));
    }
}

/// Index of the next `*` that is not part of a `**` pair.
fn find_single_star(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'*' {
            if bytes.get(i + 1) == Some(&b'*') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Breaks a line into speaker turns. A turn starts at a leading label
/// (`**Name:**`, `**Name**:` or `Name:`) or, after sentence punctuation, at a
/// bold or ALL-CAPS label such as `SPEAKER B:`.
pub fn split_speaker_turns(line: &str) -> Vec<Turn> {
    let (mut speaker, mut rest) = match leading_label(line, false) {
        Some((label, rest)) => (Some(label), rest),
        None => (None, line),
    };

    let mut turns = Vec::new();
    loop {
        match next_turn_boundary(rest) {
            Some((at, label, next)) => {
                let text = rest[..at].trim().to_string();
                if speaker.is_some() || !text.is_empty() {
                    turns.push(Turn { speaker, text });
                }
                speaker = Some(label);
                rest = next;
            }
            None => {
                turns.push(Turn {
                    speaker,
                    text: rest.trim().to_string(),
                });
                return turns;
            }
        }
    }
}

/// Finds the first mid-line label. Returns the byte offset where the current
/// turn ends, the label, and the text following the label.
fn next_turn_boundary(text: &str) -> Option<(usize, String, &str)> {
    let mut prev: Option<char> = None;
    let mut after_sentence_end = false;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if matches!(prev, Some('.' | '!' | '?' | '"' | '”' | ')')) {
                after_sentence_end = true;
            }
        } else {
            if after_sentence_end {
                if let Some((label, next)) = leading_label(&text[i..], true) {
                    return Some((i, label, next));
                }
            }
            after_sentence_end = false;
        }
        prev = Some(c);
    }
    None
}

/// Recognises a speaker label at the start of `text`. With `strict`, plain
/// (non-bold) labels must be ALL-CAPS.
fn leading_label(text: &str, strict: bool) -> Option<(String, &str)> {
    if let Some(inner) = text.strip_prefix("**") {
        let end = inner.find("**")?;
        let (label, after) = (inner[..end].trim(), &inner[end + 2..]);
        let (label, after) = match label.strip_suffix(':') {
            Some(label) => (label, after),
            None => (label, after.strip_prefix(':')?),
        };
        let label = label.trim();
        return is_speaker_name(label, false).then(|| (label.to_string(), after.trim_start()));
    }

    let colon = text.find(':')?;
    let (label, after) = (text[..colon].trim(), &text[colon + 1..]);
    if !(after.is_empty() || after.starts_with(char::is_whitespace)) {
        return None;
    }
    is_speaker_name(label, strict).then(|| (label.to_string(), after.trim_start()))
}

fn is_speaker_name(label: &str, strict: bool) -> bool {
    if label.is_empty() || label.chars().count() > MAX_SPEAKER_LABEL_CHARS {
        return false;
    }
    if !label.chars().next().is_some_and(|c| c.is_uppercase()) {
        return false;
    }
    if !label
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '\'' | '’' | '-' | '(' | ')'))
    {
        return false;
    }

    let words: Vec<&str> = label.split_whitespace().collect();
    if words.len() > MAX_SPEAKER_LABEL_WORDS {
        return false;
    }
    let capitalised = words.iter().all(|w| {
        w.chars()
            .next()
            .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit() || c == '(')
    });
    if !capitalised {
        return false;
    }

    !strict || !label.chars().any(|c| c.is_lowercase())
}

fn is_divider(line: &str) -> bool {
    line.chars().count() >= 10 && line.chars().all(|c| matches!(c, '_' | '-'))
}

fn markdown_heading(line: &str) -> Option<String> {
    let stripped = line.trim_start_matches('#');
    if stripped.len() == line.len() || !stripped.starts_with(' ') {
        return None;
    }
    let heading = stripped.trim().replace('*', "");
    (!heading.is_empty()).then_some(heading)
}

/// Content of a line that is bold from end to end (`**...**`, no inner markers).
fn whole_bold(line: &str) -> Option<&str> {
    let inner = line.strip_prefix("**")?.strip_suffix("**")?.trim();
    (!inner.is_empty() && !inner.contains("**")).then_some(inner)
}

/// `1. A Counterculture Mindset`
fn is_numbered_heading(text: &str) -> bool {
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && text[digits..].starts_with(". ") && !text[digits + 2..].trim().is_empty()
}

fn lyric_line(line: &str) -> Option<Block> {
    let unwrapped = line.trim_matches('*').trim();
    if !unwrapped.starts_with(MUSIC_NOTE) {
        return None;
    }
    let notes_only = unwrapped
        .chars()
        .all(|c| c == MUSIC_NOTE || c.is_whitespace());
    let text = if notes_only {
        unwrapped.to_string()
    } else {
        unwrapped
            .trim_start_matches(MUSIC_NOTE)
            .trim_end_matches(MUSIC_NOTE)
            .trim()
            .replace('*', "")
    };
    Some(Block::Lyric { text, notes_only })
}

/// `John 3:16`, `1 Timothy 3:1-5`, `Psalm 23`.
pub fn is_scripture_reference(text: &str) -> bool {
    if has_chapter_verse(text) {
        return true;
    }
    text.split(|c: char| !c.is_alphabetic())
        .any(|word| SCRIPTURE_BOOKS.contains(&word) || word == "Psalms")
}

fn has_chapter_verse(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let verse = chars
        .windows(3)
        .any(|w| w[0].is_ascii_digit() && w[1] == ':' && w[2].is_ascii_digit());
    let range = chars
        .windows(3)
        .any(|w| w[0].is_ascii_digit() && matches!(w[1], '-' | '\u{2013}') && w[2].is_ascii_digit());
    verse || range
}
