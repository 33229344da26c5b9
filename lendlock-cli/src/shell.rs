//! Interactive console front end.
//!
//! One explicit loop drives a small menu state machine. Every submenu
//! returns to `Main` when it finishes; bad input re-prompts the same state.

use std::io::{self, BufRead, Write};

use lendlock_core::client::LendingClient;
use lendlock_core::types::{now_ms, Item, Outcome, Reservation, DAY_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Menu {
    Main,
    AddBook,
    FindBooks,
    Reserve,
    Release,
    Prolong,
    MyReservations,
    Quit,
}

impl Menu {
    fn from_choice(choice: &str) -> Option<Self> {
        Some(match choice {
            "1" => Menu::AddBook,
            "2" => Menu::FindBooks,
            "3" => Menu::Reserve,
            "4" => Menu::Release,
            "5" => Menu::Prolong,
            "6" => Menu::MyReservations,
            "q" | "quit" => Menu::Quit,
            _ => return None,
        })
    }
}

pub struct Shell<'a, R, W> {
    client: &'a LendingClient,
    input: R,
    output: W,
    user: String,
}

impl<'a, R: BufRead, W: Write> Shell<'a, R, W> {
    pub fn new(client: &'a LendingClient, input: R, output: W) -> Self {
        Self {
            client,
            input,
            output,
            user: String::new(),
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        writeln!(self.output, "lendlock {}", env!("CARGO_PKG_VERSION"))?;
        let Some(user) = self.ask_nonempty("Your name: ")? else {
            return Ok(());
        };
        match self.client.register_holder(&user) {
            Ok(true) => writeln!(self.output, "Welcome, {}. You are now registered.", user)?,
            Ok(false) => writeln!(self.output, "Welcome back, {}.", user)?,
            Err(e) => {
                writeln!(self.output, "error: {}", e)?;
                return Ok(());
            }
        }
        self.user = user;

        let mut menu = Menu::Main;
        while menu != Menu::Quit {
            menu = match menu {
                Menu::Main => self.main_menu()?,
                Menu::AddBook => self.add_book()?,
                Menu::FindBooks => self.find_books()?,
                Menu::Reserve => self.reserve()?,
                Menu::Release => self.release()?,
                Menu::Prolong => self.prolong()?,
                Menu::MyReservations => self.my_reservations()?,
                Menu::Quit => Menu::Quit,
            };
        }
        writeln!(self.output, "Bye.")
    }

    // ─── States ─────────────────────────────────────────────────────────────

    fn main_menu(&mut self) -> io::Result<Menu> {
        writeln!(self.output)?;
        writeln!(self.output, "1) Add a book")?;
        writeln!(self.output, "2) Find books by title")?;
        writeln!(self.output, "3) Reserve a book")?;
        writeln!(self.output, "4) Return a book")?;
        writeln!(self.output, "5) Prolong a reservation")?;
        writeln!(self.output, "6) My reservations")?;
        writeln!(self.output, "q) Quit")?;
        let Some(choice) = self.ask("> ")? else {
            return Ok(Menu::Quit);
        };
        match Menu::from_choice(&choice) {
            Some(menu) => Ok(menu),
            None => {
                writeln!(self.output, "Unknown choice '{}'.", choice)?;
                Ok(Menu::Main)
            }
        }
    }

    fn add_book(&mut self) -> io::Result<Menu> {
        let Some(title) = self.ask_nonempty("Title: ")? else {
            return Ok(Menu::Quit);
        };
        let Some(author) = self.ask_nonempty("Author: ")? else {
            return Ok(Menu::Quit);
        };
        match self.client.add_item(&title, &author) {
            Ok(item) => writeln!(self.output, "Added '{}' as {}.", item.title, item.id)?,
            Err(e) => writeln!(self.output, "error: {}", e)?,
        }
        Ok(Menu::Main)
    }

    fn find_books(&mut self) -> io::Result<Menu> {
        let Some(title) = self.ask_nonempty("Title: ")? else {
            return Ok(Menu::Quit);
        };
        match self.client.find_items(&title) {
            Ok(items) if items.is_empty() => writeln!(self.output, "No copies of '{}'.", title)?,
            Ok(items) => self.print_items(&items)?,
            Err(e) => writeln!(self.output, "error: {}", e)?,
        }
        Ok(Menu::Main)
    }

    fn reserve(&mut self) -> io::Result<Menu> {
        let Some(title) = self.ask_nonempty("Title: ")? else {
            return Ok(Menu::Quit);
        };
        let items = match self.client.find_items(&title) {
            Ok(items) if items.is_empty() => {
                writeln!(self.output, "No copies of '{}'.", title)?;
                return Ok(Menu::Main);
            }
            Ok(items) => items,
            Err(e) => {
                writeln!(self.output, "error: {}", e)?;
                return Ok(Menu::Main);
            }
        };
        self.print_items(&items)?;
        let Some(index) = self.pick("Copy number: ", items.len())? else {
            return Ok(Menu::Quit);
        };
        let item = &items[index];
        let outcome = self.client.reserve(&self.user, &item.id, &item.title, None);
        self.report(outcome)?;
        Ok(Menu::Main)
    }

    fn release(&mut self) -> io::Result<Menu> {
        let Some(held) = self.held()? else {
            return Ok(Menu::Main);
        };
        let Some(index) = self.pick("Reservation number: ", held.len())? else {
            return Ok(Menu::Quit);
        };
        let reservation = &held[index];
        let outcome =
            self.client
                .release(&self.user, &reservation.item_id, &reservation.item_title);
        self.report(outcome)?;
        Ok(Menu::Main)
    }

    fn prolong(&mut self) -> io::Result<Menu> {
        let Some(held) = self.held()? else {
            return Ok(Menu::Main);
        };
        let Some(index) = self.pick("Reservation number: ", held.len())? else {
            return Ok(Menu::Quit);
        };
        let Some(days) = self.pick_days()? else {
            return Ok(Menu::Quit);
        };
        let reservation = &held[index];
        let new_due_at = reservation
            .due_at
            .max(now_ms())
            .saturating_add(days.saturating_mul(DAY_MS));
        let outcome = self
            .client
            .prolong(&self.user, &reservation.item_id, new_due_at);
        self.report(outcome)?;
        Ok(Menu::Main)
    }

    fn my_reservations(&mut self) -> io::Result<Menu> {
        self.held()?;
        Ok(Menu::Main)
    }

    // ─── Helpers ────────────────────────────────────────────────────────────

    /// Lists the user's reservations; `None` when there is nothing to act on.
    fn held(&mut self) -> io::Result<Option<Vec<Reservation>>> {
        let held = match self.client.reservations_of(&self.user) {
            Ok(held) => held,
            Err(e) => {
                writeln!(self.output, "error: {}", e)?;
                return Ok(None);
            }
        };
        if held.is_empty() {
            writeln!(self.output, "You hold no reservations.")?;
            return Ok(None);
        }
        for (n, r) in held.iter().enumerate() {
            writeln!(
                self.output,
                "{}) {} [{}] due in {} day(s)",
                n + 1,
                r.item_title,
                r.item_id,
                r.due_at.saturating_sub(now_ms()).div_ceil(DAY_MS)
            )?;
        }
        Ok(Some(held))
    }

    fn print_items(&mut self, items: &[Item]) -> io::Result<()> {
        for (n, item) in items.iter().enumerate() {
            let state = if item.available { "available" } else { "reserved" };
            writeln!(
                self.output,
                "{}) {} by {} [{}] {}",
                n + 1,
                item.title,
                item.author,
                item.id,
                state
            )?;
        }
        Ok(())
    }

    fn report(&mut self, outcome: lendlock_core::Result<Outcome>) -> io::Result<()> {
        match outcome {
            Ok(Outcome::Committed) => writeln!(self.output, "Done."),
            Ok(Outcome::Rejected { reason }) => writeln!(self.output, "Not possible: {}.", reason),
            Ok(Outcome::Indeterminate { .. }) => writeln!(
                self.output,
                "The library could not confirm the change. Check your reservations before trying again."
            ),
            Err(e) => writeln!(self.output, "error: {}", e),
        }
    }

    /// A 1-based choice from a list of `len`, returned 0-based.
    fn pick(&mut self, label: &str, len: usize) -> io::Result<Option<usize>> {
        loop {
            let Some(answer) = self.ask(label)? else {
                return Ok(None);
            };
            match answer.parse::<usize>() {
                Ok(n) if (1..=len).contains(&n) => return Ok(Some(n - 1)),
                _ => writeln!(self.output, "Enter a number from 1 to {}.", len)?,
            }
        }
    }

    fn pick_days(&mut self) -> io::Result<Option<u64>> {
        loop {
            let Some(answer) = self.ask("Extra days: ")? else {
                return Ok(None);
            };
            match answer.parse::<u64>() {
                Ok(days) if days > 0 => return Ok(Some(days)),
                _ => writeln!(self.output, "Enter a positive number of days.")?,
            }
        }
    }

    fn ask_nonempty(&mut self, label: &str) -> io::Result<Option<String>> {
        loop {
            match self.ask(label)? {
                Some(answer) if answer.is_empty() => writeln!(self.output, "Please enter a value.")?,
                other => return Ok(other),
            }
        }
    }

    /// One trimmed line, or `None` at end of input.
    fn ask(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", label)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}
