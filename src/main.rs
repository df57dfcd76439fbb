//! Line-oriented front for the chat client. Deliberately unstyled: the
//! sidebar is `:list`, the chat pane is stdout.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use chatpane::history::RemoteStore;
use chatpane::services::app::AppState;
use chatpane::services::auth::{self, AuthProvider};
use chatpane::services::config::load_ai_config;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = load_ai_config();
    let store = match RemoteStore::connect_from_env().await {
        Ok(store) => store,
        Err(err) => {
            log::error!("Conversation store init failed: {}", err);
            std::process::exit(1);
        }
    };

    let (provider, mut auth_rx) = AuthProvider::new();
    let mut app = AppState::new(store, config);

    match auth::user_from_env() {
        Some(user) => provider.sign_in(user),
        None => println!("Signed out. Set CHAT_USER_ID (and optionally CHAT_USER_EMAIL) to sign in."),
    }

    let user = auth_rx.borrow_and_update().clone();
    app.set_user(user).await;

    print_help();
    render_sidebar(&app);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        // Pick up auth changes between commands.
        if auth_rx.has_changed().unwrap_or(false) {
            let user = auth_rx.borrow_and_update().clone();
            app.set_user(user).await;
            render_sidebar(&app);
        }

        print!("> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };

        if !dispatch(&mut app, line.trim()).await {
            break;
        }
    }
}

async fn dispatch(app: &mut AppState, line: &str) -> bool {
    match line {
        "" => {}
        ":q" | ":quit" => return false,
        ":help" => print_help(),
        ":list" => render_sidebar(app),
        ":new" => {
            if app.new_conversation().await.is_some() {
                render_sidebar(app);
            }
        }
        _ if line.starts_with(":open ") => {
            if let Ok(n) = line[6..].trim().parse::<usize>() {
                if app.select_nth(n) {
                    render_transcript(app);
                }
            }
        }
        _ if line.starts_with(":delete ") => {
            if let Ok(n) = line[8..].trim().parse::<usize>() {
                if app.delete_nth(n).await {
                    render_sidebar(app);
                }
            }
        }
        _ if line.starts_with(":rename ") => {
            app.rename_selected(&line[8..]).await;
            render_sidebar(app);
        }
        _ if line.starts_with(':') => println!("Unknown command. :help for the list."),
        input => {
            if !app.is_signed_in() {
                println!("Sign in first (CHAT_USER_ID).");
                return true;
            }
            app.submit(input, |delta| {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
            })
            .await;
            println!();
        }
    }
    true
}

fn print_help() {
    println!(
        "Commands: :list  :new  :open <n>  :delete <n>  :rename <title>  :help  :quit\n\
         Anything else is sent as a chat message."
    );
}

fn render_sidebar(app: &AppState) {
    if !app.is_signed_in() {
        println!("(signed out)");
        return;
    }
    if app.conversations().is_empty() {
        println!("(no conversations)");
        return;
    }
    let selected = app.selected().map(|c| c.id.clone());
    for (index, conversation) in app.conversations().iter().enumerate() {
        let marker = if selected.as_deref() == Some(conversation.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} [{}] {} ({} messages)",
            marker,
            index,
            conversation.title,
            conversation.messages.len()
        );
    }
}

fn render_transcript(app: &AppState) {
    let Some(conversation) = app.selected() else {
        return;
    };
    println!("== {}", conversation.title);
    for message in &conversation.messages {
        println!("{}: {}", message.role.as_str(), message.content);
    }
}
