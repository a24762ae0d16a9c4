use dotenv::dotenv;
use std::sync::Arc;
use teloxide::types::{CallbackQuery, ChatId, InputFile, ParseMode};
use teloxide::{prelude::*, utils::command::BotCommands};

mod aggregate;
mod browser;
mod config;
mod mealdb;
mod paginate;
mod recipe;
mod view;

use aggregate::{aggregate, Selection};
use browser::{Browser, LoadTicket, PageError, Sessions};
use config::Config;
use mealdb::{MealDbClient, RecipeSource};
use view::Action;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type SharedSource = Arc<dyn RecipeSource>;

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum Command {
    #[command(description = "Display this text.")]
    Help,
    #[command(description = "Load the categories and browse every recipe.")]
    Start,
    #[command(description = "Pick a category.")]
    Categories,
    #[command(description = "Browse one category, e.g. /category Seafood.")]
    Category(String),
    #[command(description = "Browse every category.")]
    All,
    #[command(description = "Jump to a page, e.g. /page 2.")]
    Page(usize),
    #[command(description = "Next page.")]
    Next,
    #[command(description = "Previous page.")]
    Prev,
    #[command(description = "Show one recipe by its number, e.g. /recipe 12.")]
    Recipe(usize),
}

#[tokio::main]
async fn main() {
    // Load all env variables from .env file.
    dotenv().ok();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => panic!("Invalid configuration: {}", e),
    };
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", &config.log_level);
    }
    pretty_env_logger::init();
    log::info!("Starting bot...");

    let bot = Bot::from_env();

    log::info!("Using recipe API at {}", config.api_url);
    let source: SharedSource = match MealDbClient::new(&config.api_url, config.request_timeout) {
        Ok(client) => Arc::new(client),
        Err(e) => panic!("Failed to build the HTTP client with error {}", e),
    };
    let sessions = Arc::new(Sessions::default());

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .branch(dptree::case![Command::Help].endpoint(help))
                .branch(dptree::case![Command::Start].endpoint(start))
                .branch(dptree::case![Command::Categories].endpoint(show_categories))
                .branch(dptree::case![Command::Category(name)].endpoint(choose_category))
                .branch(dptree::case![Command::All].endpoint(choose_all))
                .branch(dptree::case![Command::Page(number)].endpoint(jump_to_page))
                .branch(dptree::case![Command::Next].endpoint(next_page))
                .branch(dptree::case![Command::Prev].endpoint(prev_page))
                .branch(dptree::case![Command::Recipe(position)].endpoint(show_recipe)),
        )
        .branch(Update::filter_callback_query().endpoint(handle_button));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![sessions, source])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn start(
    bot: Bot,
    sessions: Arc<Sessions>,
    source: SharedSource,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let categories = match source.list_categories().await {
        Ok(categories) => categories,
        Err(e) => {
            log::error!("Failed to load categories for chat {}: {}", chat, e);
            bot.send_message(
                chat,
                "Could not load the recipe categories, try /start again later.",
            )
            .await?;
            return Ok(());
        }
    };
    log::info!("Loaded {} categories for chat {}", categories.len(), chat);

    let (ticket, keyboard) = sessions.with(chat.0, |browser| {
        browser.reset();
        let ticket = browser.on_categories_loaded(categories);
        let keyboard = view::category_keyboard(browser.categories(), browser.selection());
        (ticket, keyboard)
    });
    bot.send_message(chat, "Select a category:")
        .reply_markup(keyboard)
        .await?;
    spawn_load(bot, sessions, source, chat, ticket);
    Ok(())
}

async fn show_categories(bot: Bot, sessions: Arc<Sessions>, msg: Message) -> HandlerResult {
    let chat = msg.chat.id;
    let keyboard = sessions.with(chat.0, |browser| {
        if browser.categories().is_empty() {
            None
        } else {
            Some(view::category_keyboard(
                browser.categories(),
                browser.selection(),
            ))
        }
    });
    match keyboard {
        Some(keyboard) => {
            bot.send_message(chat, "Select a category:")
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat, "No categories loaded yet, use /start.")
                .await?;
        }
    }
    Ok(())
}

async fn choose_category(
    bot: Bot,
    sessions: Arc<Sessions>,
    source: SharedSource,
    msg: Message,
    name: String,
) -> HandlerResult {
    let chat = msg.chat.id;
    match sessions.with(chat.0, |browser| Selection::parse(&name, browser.categories())) {
        Some(selection) => select(&bot, &sessions, &source, chat, selection).await,
        None => {
            bot.send_message(
                chat,
                format!("Unknown category \"{}\". See /categories.", name.trim()),
            )
            .await?;
            Ok(())
        }
    }
}

async fn choose_all(
    bot: Bot,
    sessions: Arc<Sessions>,
    source: SharedSource,
    msg: Message,
) -> HandlerResult {
    select(&bot, &sessions, &source, msg.chat.id, Selection::All).await
}

async fn jump_to_page(
    bot: Bot,
    sessions: Arc<Sessions>,
    msg: Message,
    number: usize,
) -> HandlerResult {
    change_page(&bot, &sessions, msg.chat.id, |browser| {
        browser.go_to_page(number)
    })
    .await
}

async fn next_page(bot: Bot, sessions: Arc<Sessions>, msg: Message) -> HandlerResult {
    change_page(&bot, &sessions, msg.chat.id, Browser::next_page).await
}

async fn prev_page(bot: Bot, sessions: Arc<Sessions>, msg: Message) -> HandlerResult {
    change_page(&bot, &sessions, msg.chat.id, Browser::prev_page).await
}

async fn show_recipe(
    bot: Bot,
    sessions: Arc<Sessions>,
    msg: Message,
    position: usize,
) -> HandlerResult {
    let chat = msg.chat.id;
    let found = sessions.with(chat.0, |browser| {
        browser
            .record(position)
            .cloned()
            .map(|record| (record, browser.selection().clone()))
    });
    let Some((record, selection)) = found else {
        bot.send_message(
            chat,
            format!("There is no recipe {} in the current list.", position),
        )
        .await?;
        return Ok(());
    };

    let caption = view::recipe_caption(position, &record);
    let photo = record
        .thumbnail_url
        .as_deref()
        .and_then(|thumbnail| url::Url::parse(thumbnail).ok());
    match photo {
        Some(photo) => {
            bot.send_photo(chat, InputFile::url(photo))
                .caption(caption)
                .await?;
        }
        None => {
            bot.send_message(chat, caption).await?;
        }
    }
    for text in view::recipe_body(&record, &selection) {
        bot.send_message(chat, text).await?;
    }
    Ok(())
}

async fn handle_button(
    bot: Bot,
    sessions: Arc<Sessions>,
    source: SharedSource,
    q: CallbackQuery,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    let Some(chat) = q.regular_message().map(|message| message.chat.id) else {
        return Ok(());
    };
    match q.data.as_deref().and_then(Action::parse) {
        Some(Action::Select(selection)) => select(&bot, &sessions, &source, chat, selection).await,
        Some(Action::Page(number)) => {
            change_page(&bot, &sessions, chat, |browser| browser.go_to_page(number)).await
        }
        Some(Action::Noop) => Ok(()),
        None => {
            log::warn!("Ignoring unknown button data {:?}", q.data);
            Ok(())
        }
    }
}

async fn select(
    bot: &Bot,
    sessions: &Arc<Sessions>,
    source: &SharedSource,
    chat: ChatId,
    selection: Selection,
) -> HandlerResult {
    log::info!("Chat {} selected {}", chat, selection);
    let ticket = sessions.with(chat.0, |browser| {
        browser.on_category_selected(selection.clone())
    });
    bot.send_message(chat, format!("Loading {}...", selection))
        .await?;
    spawn_load(
        bot.clone(),
        Arc::clone(sessions),
        Arc::clone(source),
        chat,
        ticket,
    );
    Ok(())
}

async fn change_page<F>(bot: &Bot, sessions: &Sessions, chat: ChatId, turn: F) -> HandlerResult
where
    F: FnOnce(&mut Browser) -> Result<usize, PageError>,
{
    match sessions.with(chat.0, turn) {
        Ok(page) => {
            log::debug!("Chat {} moved to page {}", chat, page);
            send_page(bot, sessions, chat).await
        }
        Err(e) => {
            bot.send_message(chat, e.to_string()).await?;
            Ok(())
        }
    }
}

/// Runs the aggregation in the background so the chat stays responsive.
fn spawn_load(
    bot: Bot,
    sessions: Arc<Sessions>,
    source: SharedSource,
    chat: ChatId,
    ticket: LoadTicket,
) {
    tokio::spawn(async move {
        if let Err(e) = run_load(bot, sessions, source, chat, ticket).await {
            log::error!("Failed to send recipes to chat {}: {}", chat, e);
        }
    });
}

async fn run_load(
    bot: Bot,
    sessions: Arc<Sessions>,
    source: SharedSource,
    chat: ChatId,
    ticket: LoadTicket,
) -> HandlerResult {
    let LoadTicket {
        generation,
        selection,
        categories,
    } = ticket;
    log::info!("Loading {} for chat {} (run {})", selection, chat, generation);

    match aggregate(source.as_ref(), &selection, &categories).await {
        Ok(records) => {
            let count = records.len();
            if !sessions.with(chat.0, |browser| browser.finish_load(generation, records)) {
                log::debug!("Dropping stale run {} for chat {}", generation, chat);
                return Ok(());
            }
            log::info!("Loaded {} recipes for {} in chat {}", count, selection, chat);
            send_page(&bot, &sessions, chat).await
        }
        Err(e) => {
            log::error!("Failed to load {} for chat {}: {}", selection, chat, e);
            if sessions.with(chat.0, |browser| browser.fail_load(generation)) {
                bot.send_message(
                    chat,
                    format!("Could not load {}, keeping the previous list.", selection),
                )
                .await?;
            }
            Ok(())
        }
    }
}

async fn send_page(bot: &Bot, sessions: &Sessions, chat: ChatId) -> HandlerResult {
    let (messages, keyboard) = sessions.with(chat.0, |browser| {
        let snapshot = browser.snapshot();
        (
            view::render_page(&snapshot),
            view::pagination_keyboard(&snapshot.page),
        )
    });
    let last = messages.len().saturating_sub(1);
    for (index, text) in messages.into_iter().enumerate() {
        let message = bot
            .send_message(chat, text)
            .parse_mode(ParseMode::MarkdownV2);
        if index == last {
            message.reply_markup(keyboard.clone()).await?;
        } else {
            message.await?;
        }
    }
    Ok(())
}
