//! A tiny in-memory "people" resource served through switchyard.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example people
//!
//! Try:
//!   curl http://localhost:8080/people
//!   curl -X POST http://localhost:8080/people -d 'ada'
//!   curl http://localhost:8080/people/ada
//!   curl -H 'accept: text/plain' http://localhost:8080/people/bob
//!   curl http://localhost:8080/metrics

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use switchyard::{Error, Request, Response, ResponseFactory, Router, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Serialize)]
struct Person {
    name: String,
}

type People = Arc<Mutex<Vec<Person>>>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    let people = People::default();

    let list = {
        let people = Arc::clone(&people);
        move |req: Request| {
            let people = Arc::clone(&people);
            async move {
                let snapshot = store(&people)?.clone();
                req.ok(&snapshot)
            }
        }
    };

    let add = {
        let people = Arc::clone(&people);
        move |req: Request| {
            let people = Arc::clone(&people);
            async move {
                let name = req.body_as_string().trim().to_owned();
                if name.is_empty() {
                    return req.bad_request("name is required");
                }
                store(&people)?.push(Person { name });
                req.ok_empty()
            }
        }
    };

    let exists = move |req: Request| {
        let people = Arc::clone(&people);
        async move { lookup(&req, &people) }
    };

    let app = Router::new()
        .get("/people", list)
        .post("/people", add)
        .get("/people/{person}", exists)
        .with_admin_routes();

    Server::new(config).serve(app).await
}

fn store(people: &People) -> Result<MutexGuard<'_, Vec<Person>>, Error> {
    people.lock().map_err(|_| Error::Handler("people store poisoned".into()))
}

fn lookup(req: &Request, people: &People) -> Result<Response, Error> {
    let wanted = req.variable("person").unwrap_or_default();
    let found = store(people)?.iter().any(|p| p.name == wanted);
    req.ok(&found)
}
