//! Tic-tac-toe demo
//!
//! Start a store server, then play from two terminals:
//!
//! ```text
//! tic-tac-toe serve
//! tic-tac-toe host --user alice        # prints an invite code
//! tic-tac-toe join <CODE> --user bob
//! ```

mod cli;
mod feedback;

use clap::Parser;
use cli::{Cli, Command, Input, HELP};
use tictac::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type Client = SessionBinder<RemoteStore, TimerNotifier>;

#[tokio::main]
async fn main() -> Result<(), TictacError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind } => serve(&bind).await,
        Command::Host { url, user } => play(&url, &user, None).await,
        Command::Join { code, url, user } => {
            play(&url, &user, Some(SessionId::new(code))).await
        }
    }
}

async fn serve(bind: &str) -> Result<(), TictacError> {
    let server = StoreServer::builder().bind(bind).build().await?;
    info!(addr = ?server.local_addr().ok(), "waiting for players");
    server.run().await
}

async fn play(url: &str, user: &str, code: Option<SessionId>) -> Result<(), TictacError> {
    let identity = StaticIdentity::signed_in(UserId::new(user));
    let mut auth = identity.on_auth_change();

    let store = RemoteStore::connect(url).await?;
    let (notifier, mut reminders) = TimerNotifier::new();
    let mut binder = SessionBinder::signed_in(
        &identity,
        GameStore::new(store.clone()),
        notifier,
        BinderConfig::default(),
    )?;

    match code {
        Some(code) => match binder.join(&code).await {
            Ok(()) => println!("Joined game {code}. You are O."),
            Err(e) => {
                warn!(error = %e, "join failed");
                println!("{}", feedback::join_failed(&code, &e));
                return store.close().await;
            }
        },
        None => match binder.host().await {
            Ok(code) => {
                println!("Hosting game {code}. You are X. Send the code to your opponent.");
            }
            Err(e) => {
                warn!(error = %e, "host failed");
                println!("Couldn't create a game right now. Try again.");
                return store.close().await;
            }
        },
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let bound = binder.session_id().is_some();

        tokio::select! {
            view = binder.next_snapshot(), if bound => match view {
                Some(view) => draw(&view),
                None => {
                    warn!("lost the game session");
                    break;
                }
            },

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "failed to read input");
                        break;
                    }
                };
                match Input::parse(&line) {
                    Input::Move(index) => attempt_move(&mut binder, index).await,
                    Input::Reset => {
                        if let Err(e) = binder.attempt_reset().await {
                            warn!(error = %e, "reset failed");
                            println!("Couldn't start a new round. Type r to try again.");
                        }
                    }
                    Input::Away => binder.suspend(),
                    Input::Back => binder.resume(),
                    Input::SignIn(user) => identity.sign_in(UserId::new(user)),
                    Input::SignOut => identity.sign_out(),
                    Input::Quit => break,
                    Input::Unknown(text) => println!("Unknown command {text:?}.\n{HELP}"),
                }
            }

            changed = auth.changed() => {
                if changed.is_err() {
                    break;
                }
                let user = auth.borrow_and_update().clone();
                binder.handle_auth_change(user);
                if binder.session_id().is_none() {
                    println!("Signed out of the game. Press q to quit.");
                }
            }

            Some(reminder) = reminders.recv() => {
                println!("\n*** {} ***\n{}", reminder.title, reminder.body);
            }
        }
    }

    binder.leave();
    store.close().await
}

/// Store failures are reported and the game goes on: the binder has
/// already rolled its view back, so the same move can simply be retried.
async fn attempt_move(binder: &mut Client, index: usize) {
    let result = binder.attempt_move(index).await;
    if let Err(e) = &result {
        warn!(error = %e, index, "move failed");
    }
    if let Some(message) = feedback::after_move(&result) {
        println!("{message}");
    }
    if result.is_err() {
        draw(&binder.view());
    }
}

fn draw(view: &LocalGameView) {
    let Some(session) = &view.session else {
        return;
    };

    println!();
    print!("{}", session.board);
    match (view.state, session.winner) {
        (BinderState::Bound(Phase::WaitingForOpponent), _) => {
            println!("Waiting for an opponent to join.");
        }
        (_, Some(Winner::Draw)) => println!("Draw. Type r to play again."),
        (_, Some(winner)) => println!("{winner} wins! Type r to play again."),
        (_, None) if view.is_local_turn => println!("Your move."),
        (_, None) => println!("Waiting for {}.", session.current_player),
    }
}
