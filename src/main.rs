fn main() {
    let exit_code = match hashmake::run::run() {
        Ok(code) => code,
        Err(err) => {
            println!("hashmake: error: {}", err);
            1
        }
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
