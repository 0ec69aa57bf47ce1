use bcrypt::{hash, DEFAULT_COST};
use std::env;

fn main() {
    let mut args = env::args().skip(1);
    let (Some(email), Some(password)) = (args.next(), args.next()) else {
        eprintln!("Usage: cargo run --bin hash-password <EMAIL> <PASSWORD>");
        std::process::exit(1);
    };

    match hash(&password, DEFAULT_COST) {
        Ok(hashed) => {
            println!("\nEmail    : {}", email);
            println!("Cost     : {}", DEFAULT_COST);
            println!("Hash     : {}\n", hashed);
            println!("# Create the administrator in PostgreSQL:");
            println!(
                "INSERT INTO users (first_name, last_name, email, password, access_level) \
                 VALUES ('Admin', 'User', '{}', '{}', 3);\n",
                email.replace('\'', "''"),
                hashed
            );
            println!("# Or, for the in-memory store, paste this into your .env:");
            println!("ADMIN_EMAIL={}", email);
            // quoted so dotenvy does not expand the `$` segments of the hash
            println!("ADMIN_HASH_PASSWORD='{}'", hashed);
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    }
}
