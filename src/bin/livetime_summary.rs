use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    stability::apps::run_livetime_summary(std::env::args().skip(1))
}
