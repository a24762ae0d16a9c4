use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::aggregate::Selection;
use crate::browser::Snapshot;
use crate::paginate::Page;
use crate::recipe::{Category, RecipeRecord};

/// Telegram refuses longer messages.
pub const MESSAGE_LIMIT: usize = 4096;
/// Telegram refuses longer photo captions.
pub const CAPTION_LIMIT: usize = 1024;

/// Instructions longer than this are cut on page cards; `/recipe` shows
/// them whole.
const CARD_INSTRUCTIONS_LIMIT: usize = 1500;
const CATEGORY_COLUMNS: usize = 3;
const PAGE_COLUMNS: usize = 8;

static SPECIAL_CHARACTERS: [char; 19] = [
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
    '!',
];

pub fn escape_markdown(str: &str) -> String {
    let mut new_str = String::with_capacity(str.len());
    for c in str.chars() {
        if SPECIAL_CHARACTERS.contains(&c) {
            new_str.push('\\');
        }
        new_str.push(c);
    }
    new_str
}

/// Inside `(...)` of a MarkdownV2 link only `)` and `\` need escaping.
fn escape_link_url(url: &str) -> String {
    url.replace('\\', "\\\\").replace(')', "\\)")
}

/// What an inline button asks for, carried in its callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Select(Selection),
    Page(usize),
    Noop,
}

impl Action {
    pub fn encode(&self) -> String {
        match self {
            Action::Select(Selection::All) => "cat:".to_string(),
            Action::Select(Selection::Category(name)) => format!("cat:{}", name),
            Action::Page(page) => format!("page:{}", page),
            Action::Noop => "noop".to_string(),
        }
    }

    pub fn parse(data: &str) -> Option<Action> {
        if data == "noop" {
            return Some(Action::Noop);
        }
        if let Some(name) = data.strip_prefix("cat:") {
            return Some(Action::Select(if name.is_empty() {
                Selection::All
            } else {
                Selection::Category(name.to_string())
            }));
        }
        data.strip_prefix("page:")
            .and_then(|page| page.parse().ok())
            .map(Action::Page)
    }
}

fn button(text: impl Into<String>, action: &Action) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.encode())
}

fn marked(label: &str, active: bool) -> String {
    if active {
        format!("✅ {}", label)
    } else {
        label.to_string()
    }
}

/// The category selector: "All Categories" first, then every category.
pub fn category_keyboard(categories: &[Category], selection: &Selection) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![button(
        marked("All Categories", selection.is_all()),
        &Action::Select(Selection::All),
    )]];
    let buttons: Vec<InlineKeyboardButton> = categories
        .iter()
        .map(|category| {
            let option = Selection::Category(category.name.clone());
            button(marked(&category.name, &option == selection), &Action::Select(option))
        })
        .collect();
    rows.extend(buttons.chunks(CATEGORY_COLUMNS).map(<[_]>::to_vec));
    InlineKeyboardMarkup::new(rows)
}

/// Numbered page buttons, then the previous/next arrows. Arrows at the
/// bounds do nothing.
pub fn pagination_keyboard<T>(page: &Page<'_, T>) -> InlineKeyboardMarkup {
    let numbers: Vec<InlineKeyboardButton> = page
        .numbers()
        .map(|number| {
            let label = if number == page.number {
                format!("[{}]", number)
            } else {
                number.to_string()
            };
            button(label, &Action::Page(number))
        })
        .collect();
    let mut rows: Vec<Vec<InlineKeyboardButton>> =
        numbers.chunks(PAGE_COLUMNS).map(<[_]>::to_vec).collect();

    let prev = if page.has_prev() {
        Action::Page(page.number - 1)
    } else {
        Action::Noop
    };
    let next = if page.has_next() {
        Action::Page(page.number + 1)
    } else {
        Action::Noop
    };
    rows.push(vec![button("<", &prev), button(">", &next)]);
    InlineKeyboardMarkup::new(rows)
}

fn card(position: usize, record: &RecipeRecord, with_details: bool) -> String {
    let name = escape_markdown(&record.name);
    let title = match &record.thumbnail_url {
        Some(url) => format!("*[{}]({})*", name, escape_link_url(url)),
        None => format!("*{}*", name),
    };
    let mut block = format!("{}\\. {}", position, title);
    if with_details {
        if !record.ingredients.is_empty() {
            block.push('\n');
            block.push_str(&format!("_{}_", escape_markdown(&record.ingredients.join(", "))));
        }
        if let Some(instructions) = record.instructions.as_deref() {
            block.push('\n');
            block.push_str(&escape_markdown(&truncate(
                instructions.trim(),
                CARD_INSTRUCTIONS_LIMIT,
            )));
        }
    }
    block
}

/// The current page as MarkdownV2 messages, split at card boundaries.
pub fn render_page(snapshot: &Snapshot<'_>) -> Vec<String> {
    let page = &snapshot.page;
    let mut blocks = vec![format!(
        "*{}* · page {}/{}",
        escape_markdown(&snapshot.selection.to_string()),
        page.number.min(page.total),
        page.total
    )];

    if page.items.is_empty() {
        blocks.push(if snapshot.loading {
            escape_markdown("Loading recipes...")
        } else {
            escape_markdown("No recipes to show.")
        });
    } else {
        let with_details = !snapshot.selection.is_all();
        blocks.extend(
            page.items
                .iter()
                .enumerate()
                .map(|(offset, record)| card(page.first_index + offset + 1, record, with_details)),
        );
        if !with_details {
            blocks.push(escape_markdown(
                "Pick a category with /categories to see ingredients and instructions.",
            ));
        }
    }
    join_blocks(blocks, MESSAGE_LIMIT)
}

/// Photo caption of a single recipe.
pub fn recipe_caption(position: usize, record: &RecipeRecord) -> String {
    let caption = format!("{}. {}", position, record.name);
    truncate(&caption, CAPTION_LIMIT)
}

/// Plain-text body of a single recipe: ingredients and instructions when a
/// category is selected, a hint otherwise.
pub fn recipe_body(record: &RecipeRecord, selection: &Selection) -> Vec<String> {
    if selection.is_all() {
        return vec![
            "Select a category to see ingredients and instructions: /categories".to_string(),
        ];
    }
    let mut text = String::from("Ingredients:\n");
    for ingredient in &record.ingredients {
        text.push_str(&format!("• {}\n", ingredient));
    }
    text.push_str("\nInstructions:\n");
    text.push_str(record.instructions.as_deref().unwrap_or("-"));
    split_text(&text, MESSAGE_LIMIT)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// Cuts escaped MarkdownV2 text to `limit` characters without leaving a
/// dangling escape.
fn truncate_markdown(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit.saturating_sub(1)).collect();
    let escapes = truncated.chars().rev().take_while(|c| *c == '\\').count();
    if escapes % 2 == 1 {
        truncated.pop();
    }
    truncated.push('…');
    truncated
}

/// Joins blocks with blank lines into as few messages as fit `limit`
/// characters. A block longer than `limit` is cut to fit a message of its
/// own.
fn join_blocks(blocks: Vec<String>, limit: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();
    for block in blocks {
        let block = truncate_markdown(&block, limit);
        let needed = if current.is_empty() {
            block.chars().count()
        } else {
            current.chars().count() + 2 + block.chars().count()
        };
        if needed > limit && !current.is_empty() {
            messages.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(&block);
    }
    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

/// Splits plain text into pieces of at most `limit` characters, preferring
/// to break after a newline.
fn split_text(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + limit).min(chars.len());
        if end < chars.len() {
            if let Some(newline) = chars[start..end].iter().rposition(|c| *c == '\n') {
                if newline > 0 {
                    end = start + newline + 1;
                }
            }
        }
        pieces.push(chars[start..end].iter().collect());
        start = end;
    }
    pieces
}
