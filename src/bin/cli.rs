use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;

const TOKEN_FILE: &str = ".pmbook_token";

#[derive(Parser)]
#[command(name = "pmbook-cli")]
#[command(about = "CLI for the pmbook API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:3000/api")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        name: Option<String>,
    },
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Current,
    /// Admin only.
    AddUser {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long)]
        admin: bool,
        #[arg(long)]
        pm: bool,
    },
    Users,
    CreateProject {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        start_date: Option<String>,
    },
    Projects,
    GetProject {
        #[arg(short, long)]
        id: String,
    },
    /// Replaces one phase's assignment list.
    Assign {
        #[arg(short = 'P', long)]
        project: String,
        #[arg(short = 'f', long)]
        phase: String,
        #[arg(short = 'U', long = "user", num_args = 0..)]
        users: Vec<String>,
    },
    /// PATCH a phase section, e.g. `--section planning/cost/estimateCost`.
    Section {
        #[arg(short = 'P', long)]
        project: String,
        #[arg(short, long)]
        section: String,
        #[arg(short, long)]
        body: String,
    },
    Close {
        #[arg(short = 'P', long)]
        project: String,
        #[arg(long)]
        reopen: bool,
    },
    AddWork {
        #[arg(short = 'P', long)]
        project: String,
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    Works {
        #[arg(short = 'P', long)]
        project: String,
    },
    AddDeliverable {
        #[arg(short = 'P', long)]
        project: String,
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    Deliverables {
        #[arg(short = 'P', long)]
        project: String,
    },
    AddActivity {
        #[arg(short = 'P', long)]
        project: String,
        #[arg(short, long)]
        work_package: String,
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value_t = 0.0)]
        duration: f64,
    },
    Activities {
        #[arg(short = 'P', long)]
        project: String,
    },
    Logout,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

fn authed(req: RequestBuilder) -> RequestBuilder {
    let token = fs::read_to_string(TOKEN_FILE).unwrap_or_default();
    req.bearer_auth(token.trim())
}

async fn print(req: RequestBuilder) -> Result<(), Box<dyn std::error::Error>> {
    let res = req.send().await?;
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(body) => println!("{status}\n{}", serde_json::to_string_pretty(&body)?),
        Err(_) => println!("{status} {text}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let url = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Register { email, password, name } => {
            print(client.post(format!("{url}/users/register")).json(&json!({
                "email": email,
                "password": password,
                "name": name,
            })))
            .await?;
        }
        Commands::Login { email, password } => {
            let res = client
                .post(format!("{url}/users/login"))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: LoginResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.token)?;
                println!("Logged in. Token saved to {TOKEN_FILE}");
            } else {
                println!("Login failed: {}", res.text().await?);
            }
        }
        Commands::Current => print(authed(client.get(format!("{url}/users/current")))).await?,
        Commands::AddUser { email, password, name, admin, pm } => {
            print(authed(client.post(format!("{url}/users/add"))).json(&json!({
                "email": email,
                "password": password,
                "name": name,
                "admin": admin,
                "pm": pm,
            })))
            .await?;
        }
        Commands::Users => print(authed(client.get(format!("{url}/users/all")))).await?,
        Commands::CreateProject { name, start_date } => {
            print(
                authed(client.post(format!("{url}/projects/add")))
                    .json(&json!({ "name": name, "startDate": start_date })),
            )
            .await?;
        }
        Commands::Projects => print(authed(client.get(format!("{url}/projects/all")))).await?,
        Commands::GetProject { id } => print(authed(client.get(format!("{url}/projects/{id}")))).await?,
        Commands::Assign { project, phase, users } => {
            print(
                authed(client.patch(format!("{url}/projects/{project}")))
                    .json(&json!({ "acs": { phase: users } })),
            )
            .await?;
        }
        Commands::Section { project, section, body } => {
            let body: Value = serde_json::from_str(&body)?;
            let section = section.trim_matches('/').replace('.', "/");
            print(authed(client.patch(format!("{url}/projects/{project}/{section}"))).json(&body)).await?;
        }
        Commands::Close { project, reopen } => {
            print(
                authed(client.patch(format!("{url}/projects/{project}/closing/integration/closeProject")))
                    .json(&json!({ "closed": !reopen })),
            )
            .await?;
        }
        Commands::AddWork { project, name, description } => {
            print(authed(client.post(format!("{url}/works/add"))).json(&json!({
                "name": name,
                "description": description,
                "project": project,
            })))
            .await?;
        }
        Commands::Works { project } => print(authed(client.get(format!("{url}/works/all/{project}")))).await?,
        Commands::AddDeliverable { project, name, description } => {
            print(authed(client.post(format!("{url}/deliverables/add"))).json(&json!({
                "name": name,
                "description": description,
                "project": project,
            })))
            .await?;
        }
        Commands::Deliverables { project } => {
            print(authed(client.get(format!("{url}/deliverables/all/{project}")))).await?
        }
        Commands::AddActivity { project, work_package, name, duration } => {
            print(authed(client.post(format!("{url}/activities"))).json(&json!({
                "workPackage": work_package,
                "name": name,
                "duration": duration,
                "project": project,
            })))
            .await?;
        }
        Commands::Activities { project } => print(authed(client.get(format!("{url}/activities/{project}")))).await?,
        Commands::Logout => {
            let res = authed(client.get(format!("{url}/users/logout"))).send().await?;
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out ({}, token removed).", res.status());
        }
    }

    Ok(())
}
