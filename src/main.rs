use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{
    hash::{Hash, Hasher},
    str::FromStr,
};
use storefront::{Client, Config, Mode, Outcome};
use structopt::StructOpt;
use tokio::sync::oneshot;
use tracing::{error, info};

#[derive(StructOpt)]
struct Opts {
    #[structopt(short, long, default_value = "localhost")]
    address: String,

    #[structopt(subcommand)]
    command: Command,
}

/// Values are given and printed as JSON.
#[derive(StructOpt)]
enum Command {
    /// Prints every field of a map
    GetMap { name: String },
    GetFromMap { name: String, field: String },
    PutMap { name: String, field: String, value: Json },
    DelMap {
        name: String,
        #[structopt(required = true)]
        fields: Vec<String>,
    },
    AddSet { name: String, value: Json },
    RemoveSet { name: String, value: Json },
    GetSet { name: String },
    /// Pushes onto the head of a list
    PushList { name: String, value: Json },
    GetList { name: String },
    /// Removes and prints the head of a list
    PopList { name: String },
    /// Prints the tail of a list without removing it
    PeekList { name: String },
}

/// Any JSON value, hashed by its text so it can be a set member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct Json(Value);

impl Hash for Json {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_string().hash(state)
    }
}

impl FromStr for Json {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map(Json)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let opts = Opts::from_args();

    run_with(opts).await
}

async fn run_with(opts: Opts) -> Result<()> {
    let config = Config {
        address: opts.address,
        mode: Mode::Inline,
        ..Config::default()
    };

    info!("Connecting to {}", config.address);

    let client = Client::connect(&config).await?;

    let (tx, rx) = oneshot::channel::<Outcome<Value>>();
    let done = move |outcome: Outcome<Value>| {
        let _ = tx.send(outcome);
    };

    match opts.command {
        Command::GetMap { name } => {
            client
                .get_map::<Json, _>(&name, move |outcome| {
                    done(outcome.map(|fields| {
                        let mut map = Map::new();
                        for (field, value) in fields {
                            match value {
                                Ok(value) => {
                                    map.insert(field, value.0);
                                }
                                Err(e) => error!(reason = %e, "skipping field"),
                            }
                        }
                        Value::Object(map)
                    }))
                })
                .await
        }
        Command::GetFromMap { name, field } => {
            client
                .get_from_map::<Json, _>(&name, &field, move |outcome| {
                    done(outcome.map(|keyed| json!({ "key": keyed.key, "value": keyed.value.0 })))
                })
                .await
        }
        Command::PutMap { name, field, value } => {
            client
                .put_map(&name, &field, value, move |outcome| {
                    done(outcome.map(|_| Value::Null))
                })
                .await
        }
        Command::DelMap { name, fields } => {
            client
                .del_map(&name, fields, move |outcome| done(outcome.map(|_| Value::Null)))
                .await
        }
        Command::AddSet { name, value } => {
            client
                .add_set(&name, value, move |outcome| done(outcome.map(|_| Value::Null)))
                .await
        }
        Command::RemoveSet { name, value } => {
            client
                .remove_set(&name, value, move |outcome| {
                    done(outcome.map(|_| Value::Null))
                })
                .await
        }
        Command::GetSet { name } => {
            client
                .get_set::<Json, _>(&name, move |outcome| {
                    done(outcome.map(|set| set.into_iter().map(|json| json.0).collect()))
                })
                .await
        }
        Command::PushList { name, value } => {
            client
                .push_list(&name, value, move |outcome| {
                    done(outcome.map(|_| Value::Null))
                })
                .await
        }
        Command::GetList { name } => {
            client
                .get_list::<Json, _>(&name, move |outcome| {
                    done(outcome.map(|list| list.into_iter().map(|json| json.0).collect()))
                })
                .await
        }
        Command::PopList { name } => {
            client
                .pop_list::<Json, _>(&name, move |outcome| {
                    done(outcome.map(|keyed| json!({ "key": keyed.key, "value": keyed.value.0 })))
                })
                .await
        }
        Command::PeekList { name } => {
            client
                .peek_list::<Json, _>(&name, move |outcome| {
                    done(outcome.map(|keyed| json!({ "key": keyed.key, "value": keyed.value.0 })))
                })
                .await
        }
    }

    match rx.await.context("operation did not complete")? {
        Ok(Value::Null) => info!("Done"),
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(fault) => return Err(fault.into()),
    }

    Ok(())
}

fn init_logger() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init()
}
