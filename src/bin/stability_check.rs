use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    stability::apps::run_stability_check(std::env::args().skip(1))
}
