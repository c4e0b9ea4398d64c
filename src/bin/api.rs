#[macro_use]
extern crate log;

#[tokio::main]
async fn main() -> Result<(), rocket::Error> {
    pretty_env_logger::init();

    let app = match esign_fields::setup() {
        Ok(app) => app,
        Err(err) => {
            error!("Unable to start: {}", err);
            std::process::exit(1);
        }
    };

    info!("eSign field placement API starting...");

    app.rocket
        .mount("/", esign_fields::views::routes())
        .register("/", esign_fields::views::catchers())
        .launch()
        .await?;
    Ok(())
}
