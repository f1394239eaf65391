use crate::config::toml_config::OutputSection;
use crate::domain::model::{Annotations, Classification, Identifier, ProbeResult};

/// Positive and unknown identifiers of one batch, each sorted. Negatives are
/// only counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub positive: Vec<Identifier>,
    pub unknown: Vec<Identifier>,
    pub total: usize,
}

impl Partition {
    pub fn negative_count(&self) -> usize {
        self.total - self.positive.len() - self.unknown.len()
    }
}

pub fn partition(results: &[ProbeResult]) -> Partition {
    let mut positive = Vec::new();
    let mut unknown = Vec::new();
    for result in results {
        match result.classification {
            Classification::Positive => positive.push(result.id.clone()),
            Classification::Unknown => unknown.push(result.id.clone()),
            Classification::Negative => {}
        }
    }
    positive.sort();
    unknown.sort();
    Partition {
        positive,
        unknown,
        total: results.len(),
    }
}

#[derive(Debug, Clone)]
pub struct ReportFormat {
    pub link_template: String,
    pub lines_per_chunk: usize,
    pub max_chunk_chars: usize,
    pub unknown_sample_cap: usize,
}

impl ReportFormat {
    pub fn from_config(output: &OutputSection, link_template: &str) -> Self {
        Self {
            link_template: link_template.to_string(),
            lines_per_chunk: output.lines_per_chunk,
            max_chunk_chars: output.max_chunk_chars,
            unknown_sample_cap: output.unknown_sample_cap,
        }
    }

    /// Same format, capped to what a channel accepts per message.
    pub fn limited_to(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_chars = self.max_chunk_chars.min(max_chunk_size);
        self
    }

    pub fn link_for(&self, id: &Identifier) -> String {
        self.link_template.replace("{id}", id.as_str())
    }

    pub fn header(&self, positive: usize, total: usize) -> String {
        format!("Restricted: {}/{}", positive, total)
    }

    fn numbered_line(&self, n: usize, id: &Identifier, annotations: &Annotations) -> String {
        self.render_line(n, id.as_str(), annotations.get(id).copied())
    }

    fn render_line(&self, n: usize, digits: &str, annotation: Option<Option<bool>>) -> String {
        let link = self.link_template.replace("{id}", digits);
        let line = format!("{}. <a href=\"{}\">+{}</a>", n, link, digits);
        match annotation {
            None => line,
            Some(Some(true)) => format!("{} — ❌ connected to an account", line),
            Some(Some(false)) => format!("{} — ✅ Free", line),
            Some(None) => format!("{} — ⚠️ unknown", line),
        }
    }

    /// Longest numbered line this format can produce for lists of up to
    /// `max_lines` full-length (15 digit) identifiers.
    pub fn widest_line(&self, max_lines: usize) -> usize {
        self.render_line(max_lines.max(1), "999999999999999", Some(Some(true)))
            .len()
    }

    pub fn format(&self, partition: &Partition) -> Vec<String> {
        self.format_annotated(partition, &Annotations::new())
    }

    /// Like `format`, with a status suffix on every positive line that has an
    /// entry in `annotations`.
    pub fn format_annotated(&self, partition: &Partition, annotations: &Annotations) -> Vec<String> {
        let mut chunks = if partition.positive.is_empty() {
            self.single(&format!(
                "No restricted numbers out of {} checked.",
                partition.total
            ))
        } else {
            let lines: Vec<String> = partition
                .positive
                .iter()
                .enumerate()
                .map(|(i, id)| self.numbered_line(i + 1, id, annotations))
                .collect();
            paginate(
                Some(self.header(partition.positive.len(), partition.total)),
                &lines,
                self.lines_per_chunk,
                self.max_chunk_chars,
            )
        };

        if let Some(footer) = self.unknown_footer(&partition.unknown) {
            chunks.extend(self.single(&footer));
        }
        chunks
    }

    /// A one-line message, split only if it does not fit one chunk.
    pub fn single(&self, text: &str) -> Vec<String> {
        paginate(None, &[text.to_string()], 1, self.max_chunk_chars)
    }

    fn unknown_footer(&self, unknown: &[Identifier]) -> Option<String> {
        if unknown.is_empty() || self.unknown_sample_cap == 0 {
            return None;
        }
        let mut footer = format!("Could not check {}:", unknown.len());
        let mut shown = 0;
        for id in unknown.iter().take(self.unknown_sample_cap) {
            let entry = format!(" +{}", id);
            // leave room for the "+N more" suffix
            if footer.len() + entry.len() + 24 > self.max_chunk_chars {
                break;
            }
            footer.push_str(&entry);
            shown += 1;
        }
        if shown < unknown.len() {
            footer.push_str(&format!(" +{} more", unknown.len() - shown));
        }
        Some(footer)
    }
}

/// Packs lines into newline-joined chunks of at most `lines_per_chunk` lines
/// and `max_chars` bytes. The header rides on the first chunk. A line that
/// alone exceeds `max_chars` is cut into pieces, each counted as a line.
pub fn paginate(
    header: Option<String>,
    lines: &[String],
    lines_per_chunk: usize,
    max_chars: usize,
) -> Vec<String> {
    let lines_per_chunk = lines_per_chunk.max(1);
    let max_chars = max_chars.max(MIN_CHUNK_CHARS);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut in_chunk = 0;

    if let Some(header) = header {
        let mut pieces = split_to_fit(&header, max_chars);
        current = pieces.pop().unwrap_or_default();
        chunks.extend(pieces);
    }

    for piece in lines.iter().flat_map(|line| split_to_fit(line, max_chars)) {
        let separator = usize::from(!current.is_empty());
        let full_by_lines = in_chunk >= lines_per_chunk;
        let full_by_chars = current.len() + separator + piece.len() > max_chars;
        if (full_by_lines || full_by_chars) && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            in_chunk = 0;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&piece);
        in_chunk += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Smallest chunk size honoured; one UTF-8 character always fits.
const MIN_CHUNK_CHARS: usize = 4;

/// Cuts `text` at character boundaries into pieces of at most `max_chars` bytes.
fn split_to_fit(text: &str, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in text.chars() {
        if piece.len() + c.len_utf8() > max_chars {
            pieces.push(std::mem::take(&mut piece));
        }
        piece.push(c);
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}
