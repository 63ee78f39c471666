use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    munivote::app::run_pipeline_app(std::env::args().skip(1))
}
