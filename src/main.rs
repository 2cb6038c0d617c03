#[actix_web::main]
async fn main() {
    if let Err(err) = delivery_qa_lib::run().await {
        eprintln!("delivery-qa: {}", err);
        std::process::exit(1);
    }
}
